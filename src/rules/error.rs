//! Error types for traffic rule operations.

use thiserror::Error;

/// Errors from running the rule helper scripts.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The helper could not be started at all.
    #[error("Failed to run rule helper `{cmd}`")]
    Spawn {
        /// Command line of the helper.
        cmd: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading helper output or waiting for it failed.
    #[error("I/O error while running rule helper `{cmd}`")]
    Io {
        /// Command line of the helper.
        cmd: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The rule-init helper exited unsuccessfully.
    #[error("Rule init helper `{cmd}` failed ({status}): {output}")]
    Apply {
        /// Command line of the helper.
        cmd: String,
        /// Human readable exit status.
        status: String,
        /// Combined stdout and stderr of the helper.
        output: String,
    },

    /// The rule-cleanup helper exited unsuccessfully.
    #[error("Rule cleanup helper `{cmd}` failed ({status}): {output}")]
    Revert {
        /// Command line of the helper.
        cmd: String,
        /// Human readable exit status.
        status: String,
        /// Combined stdout and stderr of the helper.
        output: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_error_display() {
        let err = RuleError::Apply {
            cmd: "sh iptable_init.sh".to_string(),
            status: "exit code 3".to_string(),
            output: "iptables: Permission denied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("iptable_init.sh"));
        assert!(msg.contains("exit code 3"));
        assert!(msg.contains("Permission denied"));
    }
}
