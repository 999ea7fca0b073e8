//! Error types for protocol parsing.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while interpreting protocol values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// An entity tag could not be read as a sync marker.
    #[error("invalid entity tag {0:?}")]
    InvalidEntityTag(String),

    /// An HTTP method name is not part of the protocol.
    #[error("unsupported method {0:?}")]
    UnsupportedMethod(String),

    /// A document did not have the expected shape.
    #[error("malformed {document}: {reason}")]
    Malformed {
        /// Which document was being read.
        document: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl ProtocolError {
    /// Creates a malformed-document error.
    pub fn malformed(document: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            document,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::InvalidEntityTag("W/abc".into());
        assert!(err.to_string().contains("W/abc"));

        let err = ProtocolError::malformed("batch response", "missing responses");
        assert_eq!(
            err.to_string(),
            "malformed batch response: missing responses"
        );
    }
}
