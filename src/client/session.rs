//! Client chat session: message list, assembly and lifecycle gating.

use super::assembly::{Applied, MessageAssembler};
use super::lifecycle::{LifecycleSignal, LifecycleStore};
use crate::config::conversation::RequestSettings;
use crate::config::CustomInstructions;
use crate::orchestrator::{ChatRequest, TurnEvent, TurnEventPayload};
use crate::types::{ChatMessage, ChatRole};

/// A decision for the UI derived from lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiDecision {
    /// The message's sources may now be rendered.
    RevealSources(String),
}

/// Conversation state on the client.
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    active: Option<(usize, MessageAssembler)>,
    lifecycle: LifecycleStore,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an externally owned lifecycle store.
    pub fn with_lifecycle(lifecycle: LifecycleStore) -> Self {
        Self {
            lifecycle,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn lifecycle(&self) -> &LifecycleStore {
        &self.lifecycle
    }

    /// Reasoning streamed for the in-progress message.
    pub fn active_reasoning(&self) -> Option<&str> {
        self.active.as_ref().map(|(_, asm)| asm.reasoning())
    }

    /// Append a user message and return its id.
    pub fn push_user(&mut self, text: impl Into<String>) -> String {
        let message = ChatMessage::user(text);
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Request for the next turn over the current message list.
    pub fn request(
        &self,
        settings: RequestSettings,
        custom_instructions: CustomInstructions,
    ) -> ChatRequest {
        ChatRequest {
            messages: self
                .messages
                .iter()
                .filter(|m| m.role != ChatRole::Assistant || !m.parts.is_empty())
                .cloned()
                .collect(),
            settings,
            custom_instructions,
        }
    }

    /// Fold one event into the session and report any UI decisions.
    pub fn ingest(&mut self, event: &TurnEvent) -> Vec<UiDecision> {
        let payload = &event.payload;
        if let TurnEventPayload::TurnStart { message_id, .. } = payload {
            self.begin(message_id);
            return Vec::new();
        }
        let Some(message_id) = payload
            .message_id()
            .map(str::to_string)
            .or_else(|| self.active.as_ref().map(|(_, asm)| asm.message().id.clone()))
        else {
            tracing::debug!(kind = payload.kind(), "event without message dropped");
            return Vec::new();
        };
        if self
            .active
            .as_ref()
            .map_or(true, |(_, asm)| asm.message().id != message_id)
        {
            self.begin(&message_id);
        }

        let Some((slot, assembler)) = self.active.as_mut() else {
            return Vec::new();
        };
        if assembler.apply(payload) == Applied::Changed {
            self.messages[*slot] = assembler.message().clone();
        }

        for signal in self.signals_for(&message_id, payload) {
            self.lifecycle.dispatch(signal);
        }
        self.reveal_if_ready(&message_id)
    }

    /// Stop ingesting the in-progress message; its partial content stays.
    pub fn stop(&mut self) {
        if let Some((_, assembler)) = self.active.take() {
            tracing::debug!(message_id = %assembler.message().id, "turn stopped");
        }
    }

    /// Clear every message and the per-message lifecycle sets.
    pub fn new_chat(&mut self) {
        self.messages.clear();
        self.active = None;
        self.lifecycle.reset();
    }

    fn begin(&mut self, message_id: &str) {
        match self.messages.iter().position(|m| m.id == message_id) {
            Some(_) if self.lifecycle.snapshot().is_message_finished(message_id) => {
                self.active = None;
            }
            Some(slot) => {
                let assembler = MessageAssembler::from_message(self.messages[slot].clone());
                self.active = Some((slot, assembler));
            }
            None => {
                let assembler = MessageAssembler::new(message_id);
                self.messages.push(assembler.message().clone());
                self.active = Some((self.messages.len() - 1, assembler));
            }
        }
    }

    fn signals_for(&self, message_id: &str, payload: &TurnEventPayload) -> Vec<LifecycleSignal> {
        let msg = || message_id.to_string();
        match payload {
            TurnEventPayload::ToolCallStart { tool_call_id, .. }
            | TurnEventPayload::ToolCall { tool_call_id, .. } => vec![
                LifecycleSignal::ToolStarted(msg()),
                LifecycleSignal::ToolCallStarted(tool_call_id.clone()),
            ],
            TurnEventPayload::ToolResult { tool_call_id, .. } => {
                let mut signals = vec![LifecycleSignal::ToolCallFinished(tool_call_id.clone())];
                let state = self.lifecycle.snapshot();
                let all_done = self.message(message_id).is_some_and(|message| {
                    message.tool_invocations().all(|inv| {
                        inv.tool_call_id == *tool_call_id
                            || state.is_tool_call_finished(&inv.tool_call_id)
                    })
                });
                if all_done {
                    signals.push(LifecycleSignal::ToolFinished(msg()));
                }
                signals
            }
            TurnEventPayload::MessageFinish { .. } | TurnEventPayload::Error { .. } => {
                vec![LifecycleSignal::MessageFinished(msg())]
            }
            _ => Vec::new(),
        }
    }

    fn reveal_if_ready(&mut self, message_id: &str) -> Vec<UiDecision> {
        let has_sources = self
            .message(message_id)
            .is_some_and(|m| !m.sources().is_empty());
        if has_sources
            && self.lifecycle.can_show_sources(message_id)
            && self
                .lifecycle
                .dispatch(LifecycleSignal::SourcesShown(message_id.to_string()))
        {
            return vec![UiDecision::RevealSources(message_id.to_string())];
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::TurnId;
    use crate::types::{FinishReason, Source};
    use serde_json::json;

    struct Script {
        turn_id: TurnId,
        seq: u64,
    }

    impl Script {
        fn event(&mut self, payload: TurnEventPayload) -> TurnEvent {
            self.seq += 1;
            TurnEvent {
                turn_id: self.turn_id,
                seq: self.seq,
                timestamp: chrono::Utc::now(),
                payload,
            }
        }
    }

    #[test]
    fn sources_are_revealed_after_tool_result_and_finish() {
        let mut session = ChatSession::new();
        session.push_user("search for tokio");
        let mut script = Script {
            turn_id: TurnId::new_v4(),
            seq: 0,
        };
        let m = "msg-a".to_string();

        let steps = vec![
            TurnEventPayload::TurnStart { message_id: m.clone(), model: "groq:x".into() },
            TurnEventPayload::ToolCall {
                message_id: m.clone(),
                tool_call_id: "c1".into(),
                tool_name: "web_search".into(),
                args: json!({ "query": "tokio" }),
            },
            TurnEventPayload::Source {
                message_id: m.clone(),
                tool_call_id: "c1".into(),
                index: 0,
                source: Source::new("https://tokio.rs", "Tokio").unwrap(),
            },
        ];
        for payload in steps {
            assert!(session.ingest(&script.event(payload)).is_empty());
        }
        assert!(!session.lifecycle().can_show_sources(&m));

        let result = script.event(TurnEventPayload::ToolResult {
            message_id: m.clone(),
            tool_call_id: "c1".into(),
            tool_name: "web_search".into(),
            result: json!({ "result": [], "sources": [] }),
            is_error: false,
        });
        assert!(session.ingest(&result).is_empty());
        assert!(session.lifecycle().snapshot().is_tool_finished(&m));

        let finish = script.event(TurnEventPayload::MessageFinish {
            message_id: m.clone(),
            finish_reason: FinishReason::Stop,
            usage: Default::default(),
        });
        assert_eq!(session.ingest(&finish), vec![UiDecision::RevealSources(m.clone())]);
        assert!(session.lifecycle().snapshot().sources_shown(&m));
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn new_chat_clears_messages_and_message_sets() {
        let mut session = ChatSession::new();
        session.push_user("hi");
        let mut script = Script {
            turn_id: TurnId::new_v4(),
            seq: 0,
        };
        session.ingest(&script.event(TurnEventPayload::TextDelta {
            message_id: "msg-b".into(),
            text: "hello".into(),
        }));
        session.ingest(&script.event(TurnEventPayload::MessageFinish {
            message_id: "msg-b".into(),
            finish_reason: FinishReason::Stop,
            usage: Default::default(),
        }));
        assert!(session.lifecycle().snapshot().is_message_finished("msg-b"));

        session.new_chat();
        assert!(session.messages().is_empty());
        assert!(!session.lifecycle().snapshot().is_message_finished("msg-b"));
    }

    #[test]
    fn stopped_turn_keeps_partial_text() {
        let mut session = ChatSession::new();
        let mut script = Script {
            turn_id: TurnId::new_v4(),
            seq: 0,
        };
        session.ingest(&script.event(TurnEventPayload::TextDelta {
            message_id: "msg-c".into(),
            text: "partial ".into(),
        }));
        session.stop();
        assert_eq!(session.message("msg-c").unwrap().text(), "partial ");
    }
}
