//! Outbound turn event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::types::{FinishReason, Source, Usage};

/// Unique turn identifier.
pub type TurnId = Uuid;

/// Event payloads emitted during one turn.
///
/// Every payload except `TurnStart` and `Error` names the assistant message it
/// belongs to. `MessageFinish` and `Error` are terminal: nothing follows them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum TurnEventPayload {
    TurnStart {
        message_id: String,
        model: String,
    },
    TextDelta {
        message_id: String,
        text: String,
    },
    ReasoningDelta {
        message_id: String,
        text: String,
    },
    /// A tool call was announced; its arguments are still streaming.
    ToolCallStart {
        message_id: String,
        tool_call_id: String,
        tool_name: String,
    },
    ToolCallDelta {
        message_id: String,
        tool_call_id: String,
        tool_name: String,
        args_text_delta: String,
    },
    /// A tool call with complete arguments, emitted before it executes.
    ToolCall {
        message_id: String,
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    Source {
        message_id: String,
        tool_call_id: String,
        index: usize,
        source: Source,
    },
    ToolResult {
        message_id: String,
        tool_call_id: String,
        tool_name: String,
        result: Value,
        #[serde(default)]
        is_error: bool,
    },
    StepFinish {
        message_id: String,
        step: u32,
        finish_reason: FinishReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    MessageFinish {
        message_id: String,
        finish_reason: FinishReason,
        #[serde(default)]
        usage: Usage,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        kind: ErrorKind,
        message: String,
    },
}

impl TurnEventPayload {
    /// Event name used on the wire (`event:` line of the SSE frame).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TurnStart { .. } => "turn-start",
            Self::TextDelta { .. } => "text-delta",
            Self::ReasoningDelta { .. } => "reasoning-delta",
            Self::ToolCallStart { .. } => "tool-call-start",
            Self::ToolCallDelta { .. } => "tool-call-delta",
            Self::ToolCall { .. } => "tool-call",
            Self::Source { .. } => "source",
            Self::ToolResult { .. } => "tool-result",
            Self::StepFinish { .. } => "step-finish",
            Self::MessageFinish { .. } => "message-finish",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MessageFinish { .. } | Self::Error { .. })
    }

    /// The assistant message this event belongs to.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::TurnStart { message_id, .. }
            | Self::TextDelta { message_id, .. }
            | Self::ReasoningDelta { message_id, .. }
            | Self::ToolCallStart { message_id, .. }
            | Self::ToolCallDelta { message_id, .. }
            | Self::ToolCall { message_id, .. }
            | Self::Source { message_id, .. }
            | Self::ToolResult { message_id, .. }
            | Self::StepFinish { message_id, .. }
            | Self::MessageFinish { message_id, .. } => Some(message_id),
            Self::Error { message_id, .. } => message_id.as_deref(),
        }
    }
}

/// Envelope for streamed turn events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TurnEvent {
    pub turn_id: TurnId,
    /// Strictly increasing within a turn, starting at 1.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: TurnEventPayload,
}

impl TurnEvent {
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.payload.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn payload_tags_are_kebab_case_with_camel_case_fields() {
        let payload = TurnEventPayload::ToolCall {
            message_id: "msg-1".into(),
            tool_call_id: "call-1".into(),
            tool_name: "web_search".into(),
            args: json!({ "query": "rust" }),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "type": "tool-call",
                "messageId": "msg-1",
                "toolCallId": "call-1",
                "toolName": "web_search",
                "args": { "query": "rust" }
            })
        );
        assert_eq!(payload.kind(), "tool-call");
    }

    #[test]
    fn error_event_carries_wire_kind() {
        let payload = TurnEventPayload::Error {
            message_id: None,
            kind: ErrorKind::UnknownTool,
            message: "The model tried to call an unknown tool.".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["kind"], "unknown_tool");
        assert!(payload.is_terminal());
        assert_eq!(payload.message_id(), None);
    }
}
