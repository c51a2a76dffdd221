//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while resolving launch parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The proxy configuration path was not given on the command line.
    #[error("{usage}")]
    Usage {
        /// Usage string printed to stderr.
        usage: String,
    },

    /// A required environment variable is absent or empty.
    #[error("missing env {key}")]
    MissingEnv {
        /// Name of the missing variable.
        key: String,
    },

    /// An environment override could not be parsed.
    #[error("Invalid config value for {field}: {message}")]
    InvalidValue {
        /// The variable that has an invalid value.
        field: String,
        /// Description of why the value is invalid.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_names_key() {
        let err = ConfigError::MissingEnv {
            key: "NODE_ID".to_string(),
        };
        assert_eq!(err.to_string(), "missing env NODE_ID");
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::invalid("PROXY_PORT", "not a port number: abc");
        let msg = err.to_string();
        assert!(msg.contains("PROXY_PORT"));
        assert!(msg.contains("abc"));
    }
}
