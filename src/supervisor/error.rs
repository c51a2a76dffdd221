//! Error types for proxy supervision.

use thiserror::Error;

use super::state::ProcessState;
use crate::privilege::PrivilegeError;

/// Errors from launching or supervising the proxy.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The proxy binary could not be started.
    #[error("Failed to spawn proxy `{program}`")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The pre-exec privilege drop failed, so the proxy was not started.
    #[error("Privilege drop failed")]
    Privilege(#[from] PrivilegeError),

    /// A pipe to the proxy was not set up.
    #[error("Proxy {0} was not captured")]
    MissingPipe(&'static str),

    /// Relaying proxy output failed.
    #[error("Failed to relay proxy output")]
    Relay(#[source] std::io::Error),

    /// Waiting for or signalling the proxy failed.
    #[error("Failed to control proxy process")]
    Wait(#[source] std::io::Error),

    /// The lifecycle state machine was driven out of order.
    #[error("Invalid process state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state.
        from: ProcessState,
        /// Requested state.
        to: ProcessState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_display() {
        let err = SupervisorError::Spawn {
            program: "/usr/local/bin/envoy".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("/usr/local/bin/envoy"));
    }

    #[test]
    fn test_privilege_error_conversion() {
        let err: SupervisorError = PrivilegeError::Switch {
            uid: 1337,
            source: std::io::Error::from_raw_os_error(1),
        }
        .into();
        assert!(matches!(err, SupervisorError::Privilege(_)));
        assert_eq!(err.to_string(), "Privilege drop failed");
    }

    #[test]
    fn test_error_chain_names_os_error_once() {
        let err: SupervisorError = PrivilegeError::Switch {
            uid: 4294967295,
            source: std::io::Error::from_raw_os_error(22),
        }
        .into();

        let chain = format!("{:#}", anyhow::Error::from(err));
        assert!(chain.starts_with("Privilege drop failed: Failed to setuid to 4294967295: "));
        assert_eq!(chain.matches("os error 22").count(), 1);
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = SupervisorError::InvalidTransition {
            from: ProcessState::Running,
            to: ProcessState::Exited,
        };
        let msg = err.to_string();
        assert!(msg.contains("Running"));
        assert!(msg.contains("Exited"));
    }
}
