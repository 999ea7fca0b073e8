//! Server configuration.

use bucketdb_protocol::ServerSettings;

/// Configuration for the in-memory server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum sub-requests per batch; `None` means unlimited.
    pub batch_max_requests: Option<usize>,
    /// Whether writes are refused.
    pub readonly: bool,
    /// Project name reported at the root.
    pub project_name: String,
    /// Project version reported at the root.
    pub project_version: String,
    /// HTTP API version reported at the root.
    pub http_api_version: String,
    /// Capabilities reported at the root.
    pub capabilities: Vec<String>,
}

impl ServerConfig {
    /// Creates a configuration with the given batch limit.
    pub fn new(batch_max_requests: Option<usize>) -> Self {
        Self {
            batch_max_requests,
            readonly: false,
            project_name: "bucketdb".into(),
            project_version: env!("CARGO_PKG_VERSION").into(),
            http_api_version: "1.0".into(),
            capabilities: Vec::new(),
        }
    }

    /// Sets the batch limit.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_max_requests = Some(limit);
        self
    }

    /// Makes the server refuse writes.
    pub fn with_readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Adds a capability.
    pub fn with_capability(mut self, name: impl Into<String>) -> Self {
        self.capabilities.push(name.into());
        self
    }

    /// Returns the settings block published at the root.
    pub fn settings(&self) -> ServerSettings {
        ServerSettings {
            batch_max_requests: self.batch_max_requests,
            readonly: Some(self.readonly),
            ..ServerSettings::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(Some(25))
    }
}
