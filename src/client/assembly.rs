//! Message assembly: folds turn events into an ordered assistant message.

use crate::error::ErrorKind;
use crate::orchestrator::TurnEventPayload;
use crate::types::{ChatMessage, ChatRole, MessagePart, ToolInvocation, ToolInvocationState};

/// What applying an event did to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    /// Valid but nothing to record (step boundaries, duplicates).
    Unchanged,
    /// Dropped: the message is finished, or the event belongs elsewhere.
    Ignored,
}

/// Builds one assistant message from the events of its turn.
#[derive(Debug, Clone)]
pub struct MessageAssembler {
    message: ChatMessage,
    reasoning: String,
    finished: bool,
    error: Option<(ErrorKind, String)>,
}

impl MessageAssembler {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message: ChatMessage::with_id(message_id, ChatRole::Assistant),
            reasoning: String::new(),
            finished: false,
            error: None,
        }
    }

    /// Continue assembling a message that already holds content.
    pub fn from_message(message: ChatMessage) -> Self {
        Self {
            message,
            reasoning: String::new(),
            finished: false,
            error: None,
        }
    }

    pub fn message(&self) -> &ChatMessage {
        &self.message
    }

    pub fn into_message(self) -> ChatMessage {
        self.message
    }

    /// Reasoning text streamed alongside the answer.
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Whether the terminal event was received. The message is frozen after.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn error(&self) -> Option<(ErrorKind, &str)> {
        self.error.as_ref().map(|(kind, msg)| (*kind, msg.as_str()))
    }

    pub fn apply(&mut self, payload: &TurnEventPayload) -> Applied {
        if self.finished {
            return Applied::Ignored;
        }
        if payload
            .message_id()
            .is_some_and(|id| id != self.message.id)
        {
            return Applied::Ignored;
        }

        match payload {
            TurnEventPayload::TextDelta { text, .. } => {
                if text.is_empty() {
                    return Applied::Unchanged;
                }
                self.append_text(text);
                Applied::Changed
            }
            TurnEventPayload::ReasoningDelta { text, .. } => {
                self.reasoning.push_str(text);
                Applied::Changed
            }
            TurnEventPayload::ToolCallStart {
                tool_call_id,
                tool_name,
                ..
            } => {
                if self.message.tool_invocation_mut(tool_call_id).is_some() {
                    return Applied::Unchanged;
                }
                self.push_invocation(tool_call_id, tool_name);
                Applied::Changed
            }
            TurnEventPayload::ToolCallDelta {
                tool_call_id,
                tool_name,
                args_text_delta,
                ..
            } => {
                let Some(invocation) = self.invocation(tool_call_id, tool_name) else {
                    return Applied::Ignored;
                };
                if !invocation.advance(ToolInvocationState::Partial) {
                    return Applied::Ignored;
                }
                invocation.args_text.push_str(args_text_delta);
                Applied::Changed
            }
            TurnEventPayload::ToolCall {
                tool_call_id,
                tool_name,
                args,
                ..
            } => {
                let Some(invocation) = self.invocation(tool_call_id, tool_name) else {
                    return Applied::Ignored;
                };
                if invocation.state.is_terminal() {
                    return Applied::Ignored;
                }
                invocation.args = args.clone();
                Applied::Changed
            }
            TurnEventPayload::Source {
                tool_call_id,
                index,
                source,
                ..
            } => {
                let duplicate = self.message.parts.iter().any(|part| {
                    matches!(part, MessagePart::Source { tool_call_id: t, index: i, .. }
                        if t == tool_call_id && i == index)
                });
                if duplicate {
                    return Applied::Unchanged;
                }
                self.message.parts.push(MessagePart::Source {
                    tool_call_id: tool_call_id.clone(),
                    index: *index,
                    source: source.clone(),
                });
                Applied::Changed
            }
            TurnEventPayload::ToolResult {
                tool_call_id,
                tool_name,
                result,
                is_error,
                ..
            } => {
                let next = if *is_error {
                    ToolInvocationState::Error
                } else {
                    ToolInvocationState::Result
                };
                let Some(invocation) = self.invocation(tool_call_id, tool_name) else {
                    return Applied::Ignored;
                };
                if !invocation.advance(next) {
                    return Applied::Ignored;
                }
                invocation.result = Some(result.clone());
                Applied::Changed
            }
            TurnEventPayload::MessageFinish { .. } => {
                self.finished = true;
                Applied::Changed
            }
            TurnEventPayload::Error { kind, message, .. } => {
                self.finished = true;
                self.error = Some((*kind, message.clone()));
                Applied::Changed
            }
            TurnEventPayload::TurnStart { .. } | TurnEventPayload::StepFinish { .. } => {
                Applied::Unchanged
            }
        }
    }

    fn append_text(&mut self, text: &str) {
        if let Some(MessagePart::Text { text: last }) = self.message.parts.last_mut() {
            last.push_str(text);
            return;
        }
        self.message.parts.push(MessagePart::Text {
            text: text.to_string(),
        });
    }

    fn push_invocation(&mut self, tool_call_id: &str, tool_name: &str) {
        self.message.parts.push(MessagePart::ToolInvocation {
            tool_invocation: ToolInvocation::pending(tool_call_id, tool_name),
        });
    }

    /// The invocation for `tool_call_id`, created pending if unseen.
    fn invocation(&mut self, tool_call_id: &str, tool_name: &str) -> Option<&mut ToolInvocation> {
        if self.message.tool_invocation_mut(tool_call_id).is_none() {
            self.push_invocation(tool_call_id, tool_name);
        }
        self.message.tool_invocation_mut(tool_call_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FinishReason, Source};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const ID: &str = "msg-1";

    fn text(t: &str) -> TurnEventPayload {
        TurnEventPayload::TextDelta {
            message_id: ID.into(),
            text: t.into(),
        }
    }

    fn call(id: &str) -> TurnEventPayload {
        TurnEventPayload::ToolCall {
            message_id: ID.into(),
            tool_call_id: id.into(),
            tool_name: "web_search".into(),
            args: json!({ "query": "q" }),
        }
    }

    fn result(id: &str, is_error: bool) -> TurnEventPayload {
        TurnEventPayload::ToolResult {
            message_id: ID.into(),
            tool_call_id: id.into(),
            tool_name: "web_search".into(),
            result: json!({ "result": [], "sources": [] }),
            is_error,
        }
    }

    fn finish() -> TurnEventPayload {
        TurnEventPayload::MessageFinish {
            message_id: ID.into(),
            finish_reason: FinishReason::Stop,
            usage: Default::default(),
        }
    }

    #[test]
    fn text_appends_until_interrupted_by_tool_part() {
        let mut asm = MessageAssembler::new(ID);
        for event in [text("Let me "), text("check."), call("c1"), result("c1", false), text("Done "), text("now.")] {
            asm.apply(&event);
        }
        let kinds: Vec<&str> = asm
            .message()
            .parts
            .iter()
            .map(|p| match p {
                MessagePart::Text { .. } => "text",
                MessagePart::ToolInvocation { .. } => "tool",
                MessagePart::Source { .. } => "source",
            })
            .collect();
        assert_eq!(kinds, vec!["text", "tool", "text"]);
        assert_eq!(asm.message().text(), "Let me check.Done now.");
    }

    #[test]
    fn tool_state_never_moves_backward() {
        let mut asm = MessageAssembler::new(ID);
        asm.apply(&call("c1"));
        asm.apply(&result("c1", false));
        let late_delta = TurnEventPayload::ToolCallDelta {
            message_id: ID.into(),
            tool_call_id: "c1".into(),
            tool_name: "web_search".into(),
            args_text_delta: "{".into(),
        };
        assert_eq!(asm.apply(&late_delta), Applied::Ignored);
        assert_eq!(asm.apply(&result("c1", true)), Applied::Ignored);
        let invocation = asm.message().tool_invocations().next().unwrap();
        assert_eq!(invocation.state, ToolInvocationState::Result);
    }

    #[test]
    fn streamed_arguments_make_the_part_partial() {
        let mut asm = MessageAssembler::new(ID);
        asm.apply(&TurnEventPayload::ToolCallStart {
            message_id: ID.into(),
            tool_call_id: "c1".into(),
            tool_name: "run_code".into(),
        });
        assert_eq!(
            asm.message().tool_invocations().next().unwrap().state,
            ToolInvocationState::Pending
        );
        for fragment in ["{\"language\":", "\"py\"}"] {
            asm.apply(&TurnEventPayload::ToolCallDelta {
                message_id: ID.into(),
                tool_call_id: "c1".into(),
                tool_name: "run_code".into(),
                args_text_delta: fragment.into(),
            });
        }
        let invocation = asm.message().tool_invocations().next().unwrap();
        assert_eq!(invocation.state, ToolInvocationState::Partial);
        assert_eq!(invocation.args_text, "{\"language\":\"py\"}");
    }

    #[test]
    fn sources_are_recorded_once_in_arrival_order() {
        let mut asm = MessageAssembler::new(ID);
        asm.apply(&call("c1"));
        for (index, url) in [(0, "https://a.dev/"), (1, "https://b.dev/"), (0, "https://a.dev/")] {
            asm.apply(&TurnEventPayload::Source {
                message_id: ID.into(),
                tool_call_id: "c1".into(),
                index,
                source: Source::new(url, "t").unwrap(),
            });
        }
        let urls: Vec<&str> = asm.message().sources().iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.dev/", "https://b.dev/"]);
    }

    #[test]
    fn finished_message_is_immutable() {
        let mut asm = MessageAssembler::new(ID);
        asm.apply(&text("4"));
        asm.apply(&finish());
        assert_eq!(asm.apply(&text("!")), Applied::Ignored);
        assert_eq!(asm.apply(&finish()), Applied::Ignored);
        assert_eq!(asm.message().text(), "4");
    }

    #[test]
    fn events_for_other_messages_are_ignored() {
        let mut asm = MessageAssembler::new(ID);
        let other = TurnEventPayload::TextDelta {
            message_id: "msg-2".into(),
            text: "x".into(),
        };
        assert_eq!(asm.apply(&other), Applied::Ignored);
        assert!(asm.message().parts.is_empty());
    }
}
