//! Core types for Luminary.

pub mod chat;
pub mod generation;
pub mod message;
pub mod stream;
pub mod usage;

pub use chat::*;
pub use generation::*;
pub use message::*;
pub use stream::*;
pub use usage::*;
