//! Run state machine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SpeedtestError};
use crate::types::PhaseKind;

/// States of a speed test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Locating,
    Selecting,
    Ping,
    Download,
    Upload,
    Complete,
    Error,
}

/// Every legal transition. Anything else is rejected.
const TRANSITIONS: &[(RunState, RunState)] = &[
    // forward path
    (RunState::Idle, RunState::Locating),
    (RunState::Locating, RunState::Selecting),
    (RunState::Selecting, RunState::Ping),
    (RunState::Ping, RunState::Download),
    (RunState::Download, RunState::Upload),
    (RunState::Upload, RunState::Complete),
    // failures
    (RunState::Locating, RunState::Error),
    (RunState::Selecting, RunState::Error),
    (RunState::Ping, RunState::Error),
    (RunState::Download, RunState::Error),
    (RunState::Upload, RunState::Error),
    // stop / reset
    (RunState::Locating, RunState::Idle),
    (RunState::Selecting, RunState::Idle),
    (RunState::Ping, RunState::Idle),
    (RunState::Download, RunState::Idle),
    (RunState::Upload, RunState::Idle),
    (RunState::Complete, RunState::Idle),
    (RunState::Error, RunState::Idle),
];

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Locating => "locating",
            RunState::Selecting => "selecting",
            RunState::Ping => "ping",
            RunState::Download => "download",
            RunState::Upload => "upload",
            RunState::Complete => "complete",
            RunState::Error => "error",
        }
    }

    /// Whether a run is currently executing
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            RunState::Locating
                | RunState::Selecting
                | RunState::Ping
                | RunState::Download
                | RunState::Upload
        )
    }

    /// Whether the gauge animation should be running
    pub fn is_throughput(&self) -> bool {
        matches!(self, RunState::Download | RunState::Upload)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Error)
    }

    pub fn can_transition_to(&self, next: RunState) -> bool {
        TRANSITIONS.contains(&(*self, next))
    }
}

impl From<PhaseKind> for RunState {
    fn from(phase: PhaseKind) -> Self {
        match phase {
            PhaseKind::Ping => RunState::Ping,
            PhaseKind::Download => RunState::Download,
            PhaseKind::Upload => RunState::Upload,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current state plus the table-checked way to leave it
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: RunState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: RunState::Idle,
        }
    }

    pub fn current(&self) -> RunState {
        self.current
    }

    /// Move to `next`, failing for transitions outside the table
    pub fn transition(&mut self, next: RunState) -> Result<RunState> {
        if !self.current.can_transition_to(next) {
            return Err(SpeedtestError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        let previous = self.current;
        self.current = next;
        tracing::debug!("Run state {} -> {}", previous, next);
        Ok(previous)
    }

    /// Return to idle from anywhere; a no-op when already idle
    pub fn reset(&mut self) -> RunState {
        let previous = self.current;
        if previous != RunState::Idle {
            self.current = RunState::Idle;
            tracing::debug!("Run state {} -> idle (reset)", previous);
        }
        previous
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RunState; 8] = [
        RunState::Idle,
        RunState::Locating,
        RunState::Selecting,
        RunState::Ping,
        RunState::Download,
        RunState::Upload,
        RunState::Complete,
        RunState::Error,
    ];

    #[test]
    fn test_forward_path() {
        let mut machine = StateMachine::new();
        for next in [
            RunState::Locating,
            RunState::Selecting,
            RunState::Ping,
            RunState::Download,
            RunState::Upload,
            RunState::Complete,
        ] {
            machine.transition(next).unwrap();
        }
        assert_eq!(machine.current(), RunState::Complete);
    }

    #[test]
    fn test_skipping_a_phase_fails() {
        let mut machine = StateMachine::new();
        machine.transition(RunState::Locating).unwrap();
        machine.transition(RunState::Selecting).unwrap();
        machine.transition(RunState::Ping).unwrap();

        let err = machine.transition(RunState::Upload).unwrap_err();
        assert!(matches!(
            err,
            SpeedtestError::InvalidTransition {
                from: RunState::Ping,
                to: RunState::Upload
            }
        ));
        assert_eq!(machine.current(), RunState::Ping);
    }

    #[test]
    fn test_no_backwards_or_repeated_phase() {
        for state in ALL {
            assert!(!state.can_transition_to(state), "{} -> {} allowed", state, state);
        }
        assert!(!RunState::Upload.can_transition_to(RunState::Download));
        assert!(!RunState::Download.can_transition_to(RunState::Ping));
    }

    #[test]
    fn test_error_reachable_only_from_in_progress() {
        for state in ALL {
            assert_eq!(
                state.can_transition_to(RunState::Error),
                state.is_in_progress(),
                "unexpected error edge from {}",
                state
            );
        }
    }

    #[test]
    fn test_error_is_terminal_until_reset() {
        let mut machine = StateMachine::new();
        machine.transition(RunState::Locating).unwrap();
        machine.transition(RunState::Error).unwrap();

        for state in ALL.into_iter().filter(|s| *s != RunState::Idle) {
            assert!(machine.clone().transition(state).is_err());
        }

        assert_eq!(machine.reset(), RunState::Error);
        assert_eq!(machine.current(), RunState::Idle);
        machine.transition(RunState::Locating).unwrap();
    }

    #[test]
    fn test_idle_only_starts_locating() {
        for state in ALL {
            assert_eq!(
                RunState::Idle.can_transition_to(state),
                state == RunState::Locating
            );
        }
    }
}
