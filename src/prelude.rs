//! Convenience re-exports for common use.

pub use crate::client::{ChatSession, LifecycleStore, MessageAssembler, UiDecision};
pub use crate::config::{ConversationConfig, CustomInstructions, LuminaryConfig};
pub use crate::error::{ErrorKind, LuminaryError, Result};
pub use crate::models::LanguageModel;
pub use crate::orchestrator::{ChatRequest, Orchestrator, TurnEvent, TurnEventPayload, TurnHandle};
pub use crate::provider::{ModelProvider, ProviderFactory};
pub use crate::tools::{Tool, ToolExecutor, ToolRegistry};
pub use crate::types::{
    ChatMessage, ChatRole, FinishReason, MessagePart, ModelMessage, Source, TextStreamDelta,
    ToolInvocationState, Usage,
};
