//! Client-side state: message assembly, lifecycle gating and the remote SSE client.

pub mod assembly;
pub mod lifecycle;
pub mod remote;
pub mod session;

pub use assembly::{Applied, MessageAssembler};
pub use lifecycle::{LifecycleSignal, LifecycleState, LifecycleStore};
pub use remote::RemoteChat;
pub use session::{ChatSession, UiDecision};
