//! Single-request executor abstraction.

use crate::backoff::{BackoffListener, BackoffNotifier};
use crate::error::{ClientError, ClientResult};
use bucketdb_protocol::{
    batch_path, root_path, BatchRequest, BatchResponse, Method, RequestDescriptor,
    ResponseEnvelope, ServerSettings,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

/// Executes one request descriptor against the remote store.
///
/// This trait abstracts the transport, allowing for different
/// implementations (HTTP, in-memory loopback, mock for testing, etc.).
///
/// Implementations must serialize `request.body` as JSON, and must report
/// statuses of 400 and above as [`ClientError::Server`] rather than
/// returning them as an envelope. Other statuses (including 304) come back
/// as envelopes.
pub trait RequestExecutor: Send + Sync {
    /// Executes a request.
    fn execute(&self, request: &RequestDescriptor) -> ClientResult<ResponseEnvelope>;

    /// Registers a listener for server backoff directives.
    ///
    /// Executors that never see backoff directives may ignore this.
    fn subscribe_backoff(&self, listener: Arc<dyn BackoffListener>) {
        let _ = listener;
    }
}

impl<E: RequestExecutor + ?Sized> RequestExecutor for Arc<E> {
    fn execute(&self, request: &RequestDescriptor) -> ClientResult<ResponseEnvelope> {
        (**self).execute(request)
    }

    fn subscribe_backoff(&self, listener: Arc<dyn BackoffListener>) {
        (**self).subscribe_backoff(listener)
    }
}

/// Turns a 4xx/5xx envelope into a [`ClientError::Server`].
pub fn ensure_success(path: &str, envelope: ResponseEnvelope) -> ClientResult<ResponseEnvelope> {
    if envelope.is_failure() {
        return Err(ClientError::Server {
            status: envelope.status,
            path: path.to_string(),
            body: envelope.body,
        });
    }
    Ok(envelope)
}

type Handler = dyn Fn(&RequestDescriptor) -> ClientResult<ResponseEnvelope> + Send + Sync;

/// A scripted executor for testing.
///
/// Every request is logged, then answered by the handler. Envelopes the
/// handler returns with a 4xx/5xx status are turned into errors the same
/// way a real executor would.
pub struct MockExecutor {
    handler: Box<Handler>,
    requests: Mutex<Vec<RequestDescriptor>>,
    backoff: BackoffNotifier,
}

impl MockExecutor {
    /// Creates a mock that fails every request.
    pub fn new() -> Self {
        Self::with_handler(|request| {
            Err(ClientError::transport_fatal(format!(
                "no mock response set for {} {}",
                request.method, request.path
            )))
        })
    }

    /// Creates a mock answering with `handler`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&RequestDescriptor) -> ClientResult<ResponseEnvelope> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            backoff: BackoffNotifier::new(),
        }
    }

    /// Creates a mock server that reports `settings` at the root and
    /// answers every batch sub-request with a 200 echoing its path.
    pub fn echo_batch(settings: ServerSettings) -> Self {
        Self::with_handler(move |request| match (request.method, request.path.as_str()) {
            (Method::Get, path) if path == root_path() => {
                Ok(ResponseEnvelope::new(200).with_body(json!({ "settings": settings })))
            }
            (Method::Post, path) if path == batch_path() => {
                let body = request.body.clone().unwrap_or_default();
                let batch: BatchRequest = serde_json::from_value(body)?;
                let responses = batch
                    .requests
                    .iter()
                    .map(|sub| {
                        ResponseEnvelope::new(200).with_body(json!({ "path": sub.path }))
                    })
                    .collect();
                Ok(ResponseEnvelope::new(200)
                    .with_body(serde_json::to_value(BatchResponse { responses })?))
            }
            _ => Ok(ResponseEnvelope::new(404)),
        })
    }

    /// Returns every request executed so far, in order.
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests executed so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the number of requests sent to `path`.
    pub fn count_for(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }

    /// Publishes a backoff directive to subscribers.
    pub fn emit_backoff(&self, duration_ms: u64) {
        self.backoff.notify(duration_ms);
    }

    /// Returns the number of backoff subscribers.
    pub fn backoff_subscribers(&self) -> usize {
        self.backoff.listener_count()
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestExecutor for MockExecutor {
    fn execute(&self, request: &RequestDescriptor) -> ClientResult<ResponseEnvelope> {
        self.requests.lock().push(request.clone());
        let envelope = (self.handler)(request)?;
        ensure_success(&request.path, envelope)
    }

    fn subscribe_backoff(&self, listener: Arc<dyn BackoffListener>) {
        self.backoff.subscribe(listener);
    }
}
