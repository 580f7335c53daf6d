//! Luminary: streaming chat assistant with tool-augmented generation.
//!
//! A turn streams model output as typed events, dispatches the model's tool
//! calls (code execution, charts, weather, quotes, web search) and feeds the
//! results back until the model answers or the step bound is reached. The
//! client side folds those events into messages and gates source display on
//! lifecycle completion.
//!
//! # Quick Start
//!
//! ```no_run
//! use luminary::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> luminary::error::Result<()> {
//! let orchestrator = Orchestrator::from_config(LuminaryConfig::from_env());
//! let request = ChatRequest::new(vec![ChatMessage::user("What is 2+2?")]);
//! let handle = orchestrator.start_turn(request, CancellationToken::new())?;
//! let (events, outcome) = handle.collect().await;
//! println!("{} events, ended {}", events.len(), outcome.phase);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod prelude;
pub mod provider;
pub mod stream_transform;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;
