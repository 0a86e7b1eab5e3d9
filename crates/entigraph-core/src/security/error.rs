//! Authentication error types.

use thiserror::Error;

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// A strategy option required at build time was not supplied.
    #[error("missing option '{option}' for {strategy} authentication")]
    MissingOption {
        /// Strategy being built.
        strategy: String,
        /// Option name.
        option: String,
    },

    /// The strategy needs a collaborator the registry was not given.
    #[error("no {0} configured")]
    MissingCollaborator(&'static str),

    /// The strategy cannot perform the operation.
    #[error("{strategy} authentication does not support {operation}")]
    Unsupported {
        /// Strategy asked.
        strategy: String,
        /// Operation refused.
        operation: &'static str,
    },

    /// Password cipher failure.
    #[error("cipher error: {0}")]
    Cipher(String),

    /// Directory server failure (unreachable, malformed answer).
    #[error("directory error: {0}")]
    Directory(String),

    /// Unknown strategy name.
    #[error("unknown authentication strategy: {0}")]
    UnknownStrategy(String),
}

/// Result type for authentication operations.
pub type SecurityResult<T> = Result<T, SecurityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SecurityError::MissingOption {
            strategy: "encrypted".to_string(),
            option: "secret_key".to_string(),
        };
        assert!(err.to_string().contains("secret_key"));
        assert!(err.to_string().contains("encrypted"));

        let err = SecurityError::Unsupported {
            strategy: "digested".to_string(),
            operation: "credential decoding",
        };
        assert_eq!(
            err.to_string(),
            "digested authentication does not support credential decoding"
        );
    }
}
