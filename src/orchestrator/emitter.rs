//! The outbound event sink of one turn.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::events::{TurnEvent, TurnEventPayload, TurnId};
use crate::tools::SourceSink;
use crate::types::Source;

struct EmitterState {
    next_seq: u64,
    closed: bool,
}

/// Serializes every event of a turn into one channel.
///
/// Sequence numbers are assigned under the same lock as the send, so channel
/// order always equals `seq` order. After a terminal event, or after
/// [`TurnEmitter::halt`], every emit is dropped.
#[derive(Clone)]
pub struct TurnEmitter {
    turn_id: TurnId,
    message_id: Arc<str>,
    tx: mpsc::UnboundedSender<TurnEvent>,
    state: Arc<Mutex<EmitterState>>,
}

impl TurnEmitter {
    pub fn new(
        turn_id: TurnId,
        message_id: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<TurnEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Self {
            turn_id,
            message_id: Arc::from(message_id.into()),
            tx,
            state: Arc::new(Mutex::new(EmitterState {
                next_seq: 1,
                closed: false,
            })),
        };
        (emitter, rx)
    }

    pub fn turn_id(&self) -> TurnId {
        self.turn_id
    }

    /// Id of the assistant message being produced.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Emit one event. Returns `false` if the event was dropped.
    pub fn emit(&self, payload: TurnEventPayload) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            tracing::debug!(turn_id = %self.turn_id, kind = payload.kind(), "event after close dropped");
            return false;
        }
        let terminal = payload.is_terminal();
        let event = TurnEvent {
            turn_id: self.turn_id,
            seq: state.next_seq,
            timestamp: chrono::Utc::now(),
            payload,
        };
        if self.tx.send(event).is_err() {
            tracing::debug!(turn_id = %self.turn_id, "event receiver dropped");
            state.closed = true;
            return false;
        }
        state.next_seq += 1;
        if terminal {
            state.closed = true;
        }
        true
    }

    /// Stop emitting without a terminal event (clean user stop).
    pub fn halt(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).closed || self.tx.is_closed()
    }
}

impl SourceSink for TurnEmitter {
    fn emit_source(&self, tool_call_id: &str, index: usize, source: Source) {
        self.emit(TurnEventPayload::Source {
            message_id: self.message_id.to_string(),
            tool_call_id: tool_call_id.to_string(),
            index,
            source,
        });
    }
}
