//! Error types for privilege dropping.

use thiserror::Error;

/// Errors from switching the process identity.
#[derive(Debug, Error)]
pub enum PrivilegeError {
    /// The uid switch failed or did not take effect.
    #[error("Failed to setuid to {uid}")]
    Switch {
        /// Target uid.
        uid: u32,
        /// OS error reported by the switch.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_error_display() {
        let err = PrivilegeError::Switch {
            uid: 1337,
            source: std::io::Error::from_raw_os_error(1),
        };
        assert_eq!(err.to_string(), "Failed to setuid to 1337");

        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().to_lowercase().contains("not permitted"));
    }
}
