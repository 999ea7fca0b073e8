//! Error types for the in-memory server.

use serde_json::{json, Value};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors the server answers requests with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No such resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// No route for this method on this path.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// A write precondition did not hold.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Writes are disabled.
    #[error("server is readonly")]
    Readonly,

    /// Failure injected by a test.
    #[error("injected failure with status {0}")]
    Injected(u16),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the HTTP status for this error.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::NotFound(_) => 404,
            ServerError::MethodNotAllowed(_) => 405,
            ServerError::PreconditionFailed(_) => 412,
            ServerError::Readonly => 405,
            ServerError::Injected(status) => *status,
            ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }

    /// Returns the JSON error body.
    pub fn to_body(&self) -> Value {
        json!({
            "code": self.status(),
            "error": self.reason(),
            "message": self.to_string(),
        })
    }

    fn reason(&self) -> &'static str {
        match self.status() {
            400 => "Invalid parameters",
            404 => "Not Found",
            405 => "Method Not Allowed",
            412 => "Precondition Failed",
            503 => "Service Unavailable",
            status if status >= 500 => "Internal Server Error",
            _ => "Error",
        }
    }
}
