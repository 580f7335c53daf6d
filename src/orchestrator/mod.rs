//! Turn orchestration: model streaming, tool dispatch and the outbound event stream.

pub mod emitter;
pub mod events;
pub mod explain;
pub mod prompt;
pub mod request;
pub mod runner;
pub mod state;

pub use emitter::TurnEmitter;
pub use events::{TurnEvent, TurnEventPayload, TurnId};
pub use explain::{ExplainToolRequest, EXPLAIN_MODEL};
pub use prompt::build_system_prompt;
pub use request::{to_model_messages, ChatRequest};
pub use runner::{Orchestrator, TurnHandle, TurnOutcome};
pub use state::{TurnPhase, TurnState};
