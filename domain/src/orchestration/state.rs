//! Run state machine

use serde::{Deserialize, Serialize};

/// State of the mode controller for the current run.
///
/// ```text
/// Idle → Dispatching → Streaming → Settling → Complete
///            └──────────────→ Failed (no channel could start)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No active request
    #[default]
    Idle,
    /// Channels are being issued
    Dispatching,
    /// At least one channel has received a delta and is not yet terminal
    Streaming,
    /// Every primary channel is terminal; the summary may be running
    Settling,
    /// Every channel, including any summary channel, is terminal
    Complete,
    /// Zero channels could be started
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &str {
        match self {
            RunState::Idle => "idle",
            RunState::Dispatching => "dispatching",
            RunState::Streaming => "streaming",
            RunState::Settling => "settling",
            RunState::Complete => "complete",
            RunState::Failed => "failed",
        }
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// A relay moves back from `Streaming` to `Dispatching` for every hop.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Dispatching)
                | (Dispatching, Streaming)
                | (Dispatching, Settling)
                | (Dispatching, Failed)
                | (Streaming, Dispatching)
                | (Streaming, Settling)
                | (Settling, Streaming)
                | (Settling, Complete)
                | (Dispatching, Complete)
                | (Streaming, Complete)
        )
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            RunState::Idle,
            RunState::Dispatching,
            RunState::Streaming,
            RunState::Settling,
            RunState::Streaming,
            RunState::Settling,
            RunState::Complete,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn test_failed_only_from_dispatching() {
        assert!(RunState::Dispatching.can_transition_to(RunState::Failed));
        assert!(!RunState::Streaming.can_transition_to(RunState::Failed));
        assert!(!RunState::Settling.can_transition_to(RunState::Failed));
    }

    #[test]
    fn test_finished_states() {
        assert!(RunState::Complete.is_finished());
        assert!(RunState::Failed.is_finished());
        assert!(!RunState::Settling.is_finished());
    }
}
