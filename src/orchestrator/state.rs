//! Turn state machine.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Phase of a turn.
///
/// `Requesting -> Generating -> (ToolDispatch <-> Generating)* -> Finalizing -> Done`,
/// with `Errored` and `Stopped` reachable from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnPhase {
    Requesting,
    Generating,
    ToolDispatch,
    Finalizing,
    Done,
    Errored,
    /// Client-initiated cancellation.
    Stopped,
}

impl TurnPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Errored | Self::Stopped)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use TurnPhase::*;
        if self.is_terminal() {
            return false;
        }
        match next {
            Errored | Stopped => true,
            Generating => matches!(self, Requesting | ToolDispatch),
            ToolDispatch => self == Generating,
            Finalizing => matches!(self, Generating | ToolDispatch),
            Done => self == Finalizing,
            Requesting => false,
        }
    }
}

/// Phase plus the step counter threaded through a turn.
#[derive(Debug, Clone)]
pub struct TurnState {
    phase: TurnPhase,
    tool_steps: u32,
    max_tool_steps: u32,
}

impl TurnState {
    pub fn new(max_tool_steps: u32) -> Self {
        Self {
            phase: TurnPhase::Requesting,
            tool_steps: 0,
            max_tool_steps,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Completed tool dispatch rounds.
    pub fn tool_steps(&self) -> u32 {
        self.tool_steps
    }

    /// Whether another dispatch round is allowed.
    pub fn can_dispatch(&self) -> bool {
        self.tool_steps < self.max_tool_steps
    }

    /// Move to `next`. Illegal transitions are ignored and reported.
    pub fn transition(&mut self, next: TurnPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            tracing::warn!(from = %self.phase, to = %next, "illegal turn transition ignored");
            return false;
        }
        tracing::debug!(from = %self.phase, to = %next, step = self.tool_steps, "turn transition");
        if next == TurnPhase::ToolDispatch {
            self.tool_steps += 1;
        }
        self.phase = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_rounds_are_counted_and_bounded() {
        let mut state = TurnState::new(2);
        assert!(state.transition(TurnPhase::Generating));
        for _ in 0..2 {
            assert!(state.can_dispatch());
            assert!(state.transition(TurnPhase::ToolDispatch));
            assert!(state.transition(TurnPhase::Generating));
        }
        assert!(!state.can_dispatch());
        assert_eq!(state.tool_steps(), 2);
        assert!(state.transition(TurnPhase::Finalizing));
        assert!(state.transition(TurnPhase::Done));
    }

    #[test]
    fn terminal_phases_are_final() {
        let mut state = TurnState::new(5);
        assert!(state.transition(TurnPhase::Stopped));
        assert!(!state.transition(TurnPhase::Generating));
        assert!(!state.transition(TurnPhase::Errored));
        assert_eq!(state.phase(), TurnPhase::Stopped);
    }

    #[test]
    fn done_requires_finalizing() {
        assert!(!TurnPhase::Generating.can_transition_to(TurnPhase::Done));
        assert!(!TurnPhase::Requesting.can_transition_to(TurnPhase::ToolDispatch));
        assert!(TurnPhase::ToolDispatch.can_transition_to(TurnPhase::Finalizing));
    }
}
