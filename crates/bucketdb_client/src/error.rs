//! Error types for the client core.

use bucketdb_protocol::{ProtocolError, SyncMarker};
use serde_json::Value;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the remote store.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server answered a physical request with a 4xx/5xx status.
    #[error("server returned {status} for {path}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Path of the failed request.
        path: String,
        /// Parsed error body, if any.
        body: Option<Value>,
    },

    /// Protocol error (unexpected document shape or header value).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server reports a newer collection state but returned no records,
    /// so its history was reset since the last sync.
    #[error(
        "remote collection {collection} appears to have been reset: \
         local marker {local}, remote marker {remote}, no changes returned"
    )]
    StoreReset {
        /// Collection that was polled.
        collection: String,
        /// Marker the caller supplied.
        local: SyncMarker,
        /// Marker the server reported.
        remote: SyncMarker,
    },

    /// Responses and requests handed to aggregation do not line up.
    #[error("cannot pair {responses} responses with {requests} requests")]
    PreconditionViolation {
        /// Number of requests.
        requests: usize,
        /// Number of responses.
        responses: usize,
    },

    /// A chunk of a multi-chunk batch failed after other chunks may have
    /// been applied on the server.
    #[error(
        "batch chunk {failed_chunk} of {total_chunks} failed; \
         {applied_requests} sub-requests were already applied: {source}"
    )]
    PartialBatch {
        /// Zero-based index of the first failed chunk.
        failed_chunk: usize,
        /// Number of chunks the batch was split into.
        total_chunks: usize,
        /// Sub-requests in chunks that completed successfully.
        applied_requests: usize,
        /// The chunk's error.
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    ///
    /// A reset store is never retryable: the caller has to resync from
    /// scratch instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { retryable, .. } => *retryable,
            ClientError::Server { status, .. } => *status >= 500,
            ClientError::PartialBatch { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns the HTTP status for server errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            ClientError::PartialBatch { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Returns true if the error reports a reset remote store.
    pub fn is_store_reset(&self) -> bool {
        matches!(self, ClientError::StoreReset { .. })
    }
}
