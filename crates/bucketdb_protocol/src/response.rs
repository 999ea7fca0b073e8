//! Response envelopes.

use crate::request::Headers;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status code the server uses when a conditional GET matched.
pub const STATUS_NOT_MODIFIED: u16 = 304;

/// The status, headers and parsed body of one response.
///
/// Produced by the executor for physical requests, and found inside
/// batch responses for sub-requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    #[serde(default)]
    pub headers: Headers,
    /// Parsed JSON body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ResponseEnvelope {
    /// Creates an envelope with no headers and no body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for a 304 response.
    pub fn is_not_modified(&self) -> bool {
        self.status == STATUS_NOT_MODIFIED
    }

    /// Returns true when the status marks the request as failed (4xx/5xx).
    pub fn is_failure(&self) -> bool {
        self.status >= 400
    }
}
