//! Streaming types produced by model providers.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;
use super::message::AgentToolCall;
use super::usage::Usage;

/// A delta emitted while a provider streams one model step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStreamDelta {
    /// The incremental text chunk (text or reasoning, per `event_type`).
    pub text: String,
    pub event_type: StreamEventType,
    /// Completed tool call (only on `ToolCall`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<AgentToolCall>,
    /// Fragment of a tool call being built (`ToolCallStart` / `ToolCallDelta`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_delta: Option<ToolCallDelta>,
    /// Finish reason (only on the final delta).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Usage (typically only on the final delta).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl TextStreamDelta {
    fn bare(event_type: StreamEventType) -> Self {
        Self {
            text: String::new(),
            event_type,
            tool_call: None,
            tool_call_delta: None,
            finish_reason: None,
            usage: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::bare(StreamEventType::TextDelta)
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::bare(StreamEventType::ReasoningDelta)
        }
    }

    pub fn tool_call_start(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tool_call_delta: Some(ToolCallDelta {
                id: id.into(),
                name: name.into(),
                arguments_delta: String::new(),
            }),
            ..Self::bare(StreamEventType::ToolCallStart)
        }
    }

    pub fn tool_call_fragment(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments_delta: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_delta: Some(ToolCallDelta {
                id: id.into(),
                name: name.into(),
                arguments_delta: arguments_delta.into(),
            }),
            ..Self::bare(StreamEventType::ToolCallDelta)
        }
    }

    pub fn tool_call(call: AgentToolCall) -> Self {
        Self {
            tool_call: Some(call),
            ..Self::bare(StreamEventType::ToolCall)
        }
    }

    pub fn done(finish_reason: FinishReason, usage: Option<Usage>) -> Self {
        Self {
            finish_reason: Some(finish_reason),
            usage,
            ..Self::bare(StreamEventType::Done)
        }
    }
}

/// Partial tool-call data streamed before the arguments are complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallDelta {
    pub id: String,
    pub name: String,
    pub arguments_delta: String,
}

/// Type of stream event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    /// Incremental text content.
    TextDelta,
    /// Incremental reasoning content.
    ReasoningDelta,
    /// A tool call was announced (id and name known).
    ToolCallStart,
    /// A fragment of a tool call's arguments.
    ToolCallDelta,
    /// A tool call with complete arguments.
    ToolCall,
    /// Step finished.
    Done,
}
