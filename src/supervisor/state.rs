//! Lifecycle states of the supervised proxy.

use super::error::SupervisorError;

/// Where the supervised proxy is in its lifecycle.
///
/// `Exited` is only reachable through `Terminating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned, relay not yet started.
    Starting,
    /// Relay loop running.
    Running,
    /// Shutdown requested or output stream closed; cleanup pending.
    Terminating,
    /// Cleanup done and the proxy reaped.
    Exited,
}

impl ProcessState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, next),
            (Starting, Running)
                | (Starting, Terminating)
                | (Running, Terminating)
                | (Terminating, Exited)
        )
    }

    /// Validate a transition, returning the new state.
    pub fn transition(self, next: ProcessState) -> Result<ProcessState, SupervisorError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SupervisorError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProcessState::*;

    #[test]
    fn test_normal_lifecycle() {
        let state = Starting
            .transition(Running)
            .and_then(|s| s.transition(Terminating))
            .and_then(|s| s.transition(Exited))
            .unwrap();
        assert_eq!(state, Exited);
    }

    #[test]
    fn test_terminate_before_running() {
        assert!(Starting.can_transition_to(Terminating));
    }

    #[test]
    fn test_exited_requires_terminating() {
        assert!(Starting.transition(Exited).is_err());
        assert!(Running.transition(Exited).is_err());
    }

    #[test]
    fn test_no_backwards_transitions() {
        assert!(!Running.can_transition_to(Starting));
        assert!(!Terminating.can_transition_to(Running));
        assert!(!Exited.can_transition_to(Terminating));
        assert!(!Exited.can_transition_to(Exited));
    }
}
