//! Lifecycle tracker: reconciles completion signals into UI gating decisions.
//!
//! [`LifecycleState`] is a pure reducer over id sets. [`LifecycleStore`] wraps
//! it in a `watch` channel so observers re-evaluate derived predicates
//! whenever an input set actually changes.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;

/// Input to the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LifecycleSignal {
    MessageFinished(String),
    ToolStarted(String),
    ToolFinished(String),
    SourcesShown(String),
    ToolCallStarted(String),
    ToolCallFinished(String),
    /// New chat: clears the per-message sets.
    Reset,
}

/// Id sets tracked per conversation.
///
/// The four per-message sets are cleared by [`LifecycleSignal::Reset`]; the
/// per-tool-call sets live for the whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleState {
    finished_messages: HashSet<String>,
    tool_started_messages: HashSet<String>,
    tool_finished_messages: HashSet<String>,
    shown_sources: HashSet<String>,
    tool_calls_started: HashSet<String>,
    tool_calls_finished: HashSet<String>,
}

impl LifecycleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a signal. Returns whether anything changed.
    pub fn apply(&mut self, signal: &LifecycleSignal) -> bool {
        match signal {
            LifecycleSignal::MessageFinished(id) => self.finished_messages.insert(id.clone()),
            LifecycleSignal::ToolStarted(id) => self.tool_started_messages.insert(id.clone()),
            LifecycleSignal::ToolFinished(id) => self.tool_finished_messages.insert(id.clone()),
            LifecycleSignal::SourcesShown(id) => {
                // Guarded: an id only enters shown_sources once revealable.
                self.can_show_sources(id) && self.shown_sources.insert(id.clone())
            }
            LifecycleSignal::ToolCallStarted(id) => self.tool_calls_started.insert(id.clone()),
            LifecycleSignal::ToolCallFinished(id) => self.tool_calls_finished.insert(id.clone()),
            LifecycleSignal::Reset => self.reset(),
        }
    }

    /// Pure form of [`apply`](Self::apply).
    pub fn reduce(mut self, signal: &LifecycleSignal) -> Self {
        self.apply(signal);
        self
    }

    pub fn mark_message_finished(&mut self, id: &str) -> bool {
        self.apply(&LifecycleSignal::MessageFinished(id.to_string()))
    }

    pub fn mark_tool_started(&mut self, id: &str) -> bool {
        self.apply(&LifecycleSignal::ToolStarted(id.to_string()))
    }

    pub fn mark_tool_finished(&mut self, id: &str) -> bool {
        self.apply(&LifecycleSignal::ToolFinished(id.to_string()))
    }

    pub fn mark_sources_shown(&mut self, id: &str) -> bool {
        self.apply(&LifecycleSignal::SourcesShown(id.to_string()))
    }

    pub fn mark_tool_call_started(&mut self, call_id: &str) -> bool {
        self.apply(&LifecycleSignal::ToolCallStarted(call_id.to_string()))
    }

    pub fn mark_tool_call_finished(&mut self, call_id: &str) -> bool {
        self.apply(&LifecycleSignal::ToolCallFinished(call_id.to_string()))
    }

    /// Clear the per-message sets.
    pub fn reset(&mut self) -> bool {
        let changed = !(self.finished_messages.is_empty()
            && self.tool_started_messages.is_empty()
            && self.tool_finished_messages.is_empty()
            && self.shown_sources.is_empty());
        self.finished_messages.clear();
        self.tool_started_messages.clear();
        self.tool_finished_messages.clear();
        self.shown_sources.clear();
        changed
    }

    /// Finished, no tool outstanding, and not revealed yet.
    pub fn can_show_sources(&self, id: &str) -> bool {
        self.finished_messages.contains(id)
            && (!self.tool_started_messages.contains(id) || self.tool_finished_messages.contains(id))
            && !self.shown_sources.contains(id)
    }

    pub fn is_message_finished(&self, id: &str) -> bool {
        self.finished_messages.contains(id)
    }

    pub fn is_tool_started(&self, id: &str) -> bool {
        self.tool_started_messages.contains(id)
    }

    pub fn is_tool_finished(&self, id: &str) -> bool {
        self.tool_finished_messages.contains(id)
    }

    pub fn sources_shown(&self, id: &str) -> bool {
        self.shown_sources.contains(id)
    }

    pub fn is_tool_call_started(&self, call_id: &str) -> bool {
        self.tool_calls_started.contains(call_id)
    }

    pub fn is_tool_call_finished(&self, call_id: &str) -> bool {
        self.tool_calls_finished.contains(call_id)
    }

    /// Whether every listed tool call has finished.
    pub fn all_tool_calls_finished<'a>(&self, mut call_ids: impl Iterator<Item = &'a str>) -> bool {
        call_ids.all(|id| self.tool_calls_finished.contains(id))
    }
}

/// Injectable, observable lifecycle store.
#[derive(Clone)]
pub struct LifecycleStore {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Default for LifecycleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifecycleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LifecycleStore").field(&*self.tx.borrow()).finish()
    }
}

impl LifecycleStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Apply a signal; subscribers are notified only if state changed.
    pub fn dispatch(&self, signal: LifecycleSignal) -> bool {
        self.tx.send_if_modified(|state| state.apply(&signal))
    }

    pub fn snapshot(&self) -> LifecycleState {
        self.tx.borrow().clone()
    }

    pub fn can_show_sources(&self, id: &str) -> bool {
        self.tx.borrow().can_show_sources(id)
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    pub fn reset(&self) -> bool {
        self.dispatch(LifecycleSignal::Reset)
    }
}
