//! Client configuration and per-call options.

use bucketdb_protocol::Headers;

/// Default bucket used when neither the config nor a call names one.
pub const DEFAULT_BUCKET: &str = "default";

/// Configuration for a [`RemoteClient`](crate::RemoteClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server URL, e.g. `https://store.example.com/v1`.
    ///
    /// Used as the base URL by [`RemoteClient::connect`](crate::RemoteClient::connect).
    /// Clients built over an existing executor keep it for reference only.
    pub server_url: String,
    /// Headers sent with every request.
    pub headers: Headers,
    /// How many batch chunks may be in flight at once.
    pub batch_concurrency: usize,
    /// Bucket used when a call does not name one.
    pub bucket: String,
}

impl ClientConfig {
    /// Creates a new client configuration.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            headers: Headers::new(),
            batch_concurrency: 1,
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets how many batch chunks may run in parallel. Zero is read as one.
    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    /// Sets the default bucket.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Resolves per-call options against this configuration.
    ///
    /// Headers are unioned, call-site values winning per name. Every other
    /// field takes the call-site value when set and the configured value
    /// otherwise.
    pub fn resolve(&self, options: &RequestOptions) -> ResolvedOptions {
        ResolvedOptions {
            headers: self.headers.merged(&options.headers),
            concurrency: options
                .concurrency
                .unwrap_or(self.batch_concurrency)
                .max(1),
            bucket: options
                .bucket
                .clone()
                .unwrap_or_else(|| self.bucket.clone()),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Per-call overrides of the client configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers for this call.
    pub headers: Headers,
    /// Chunk concurrency for this call.
    pub concurrency: Option<usize>,
    /// Bucket for this call.
    pub bucket: Option<String>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header for this call.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the chunk concurrency for this call.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Sets the bucket for this call.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }
}

/// Options after merging the configuration with call-site overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    /// Headers for the call.
    pub headers: Headers,
    /// Chunk concurrency, at least one.
    pub concurrency: usize,
    /// Bucket for the call.
    pub bucket: String,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        ClientConfig::default().resolve(&RequestOptions::default())
    }
}
