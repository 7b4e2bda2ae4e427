// =============================================================================
// Session State Machine — authoritative lifecycle transition rules
// =============================================================================
//
// A session's stored status is only ever mutated by a caller that has first
// checked `can_transition`. The executor's internal latches (see executor.rs)
// reflect this state but never decide it.
// =============================================================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Paused,
    Stopped,
    Error,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Return `true` if transitioning from `from` to `to` is a legal move.
///
/// PENDING  -> {RUNNING, STOPPED}
/// RUNNING  -> {PAUSED, STOPPED, ERROR}
/// PAUSED   -> {RUNNING, STOPPED}
/// STOPPED  -> {}            (terminal)
/// ERROR    -> {STOPPED}
pub fn can_transition(from: SessionStatus, to: SessionStatus) -> bool {
    use SessionStatus::*;
    matches!(
        (from, to),
        (Pending, Running)
            | (Pending, Stopped)
            | (Running, Paused)
            | (Running, Stopped)
            | (Running, Error)
            | (Paused, Running)
            | (Paused, Stopped)
            | (Error, Stopped)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionStatus::*;

    #[test]
    fn pending_transitions() {
        assert!(can_transition(Pending, Running));
        assert!(can_transition(Pending, Stopped));
        assert!(!can_transition(Pending, Paused));
        assert!(!can_transition(Pending, Error));
    }

    #[test]
    fn running_transitions() {
        assert!(can_transition(Running, Paused));
        assert!(can_transition(Running, Stopped));
        assert!(can_transition(Running, Error));
        assert!(!can_transition(Running, Pending));
    }

    #[test]
    fn paused_transitions() {
        assert!(can_transition(Paused, Running));
        assert!(can_transition(Paused, Stopped));
        assert!(!can_transition(Paused, Error));
        assert!(!can_transition(Paused, Pending));
    }

    #[test]
    fn stopped_is_terminal() {
        for target in [Pending, Running, Paused, Stopped, Error] {
            assert!(!can_transition(Stopped, target));
        }
    }

    #[test]
    fn error_transitions() {
        assert!(can_transition(Error, Stopped));
        assert!(!can_transition(Error, Running));
        assert!(!can_transition(Error, Paused));
        assert!(!can_transition(Error, Pending));
    }

    // S8 — spec.md scenario pins.
    #[test]
    fn s8_state_machine_scenarios() {
        assert!(!can_transition(Stopped, Running));
        assert!(can_transition(Paused, Running));
        assert!(!can_transition(Error, Running));
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(Running.to_string(), "running");
        assert_eq!(Error.to_string(), "error");
    }
}
