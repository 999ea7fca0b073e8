//! In-memory store server.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handler::{HandlerContext, RequestHandler};
use crate::store::RecordStore;
use bucketdb_client::{HttpResponse, LoopbackServer, ALERT_HEADER, BACKOFF_HEADER};
use bucketdb_protocol::{batch_path, Headers, Method, RequestDescriptor, ResponseEnvelope};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Faults and directives injected by tests.
#[derive(Default)]
struct Faults {
    backoff_seconds: Option<u64>,
    alert: Option<Value>,
    fail_next: VecDeque<u16>,
    /// Batch call index -> status to answer with.
    fail_batches: BTreeMap<usize, u16>,
    batch_calls: usize,
}

/// An in-memory store server.
///
/// Speaks the root, batch and record endpoints over the loopback HTTP seam
/// so a client can be tested end to end without a network.
///
/// # Example
///
/// ```
/// use bucketdb_client::{ClientConfig, HttpExecutor, LoopbackClient, RemoteClient};
/// use bucketdb_testkit::{MemoryServer, ServerConfig};
/// use std::sync::Arc;
///
/// let server = Arc::new(MemoryServer::new(ServerConfig::default()));
/// let executor = HttpExecutor::new("memory://", LoopbackClient::new(Arc::clone(&server)));
/// let client = RemoteClient::new(ClientConfig::new("memory://"), executor);
///
/// let settings = client.server_settings().unwrap();
/// assert_eq!(settings.batch_limit(), Some(25));
/// ```
pub struct MemoryServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
    faults: Mutex<Faults>,
    log: Mutex<Vec<String>>,
}

impl MemoryServer {
    /// Creates a new server with empty storage.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(RecordStore::new()))
    }

    /// Creates a server over existing storage.
    pub fn with_store(config: ServerConfig, store: Arc<RecordStore>) -> Self {
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self {
            handler,
            context,
            faults: Mutex::new(Faults::default()),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Returns the record storage.
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.context.store
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Drops all data while moving the clock forward.
    pub fn flush(&self) {
        debug!("flushing store");
        self.context.store.flush();
    }

    /// Adds a `Backoff` header, in seconds, to every response.
    pub fn set_backoff(&self, seconds: Option<u64>) {
        self.faults.lock().backoff_seconds = seconds;
    }

    /// Adds an `Alert` header to every response.
    pub fn set_alert(&self, alert: Option<Value>) {
        self.faults.lock().alert = alert;
    }

    /// Answers the next request with `status`.
    pub fn fail_next(&self, status: u16) {
        self.faults.lock().fail_next.push_back(status);
    }

    /// Answers the `index`-th batch call (counting from 0) with `status`.
    pub fn fail_batch(&self, index: usize, status: u16) {
        self.faults.lock().fail_batches.insert(index, status);
    }

    /// Returns every request received, as `"METHOD path"`.
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Returns the number of requests received.
    pub fn request_count(&self) -> usize {
        self.log.lock().len()
    }

    /// Returns the number of batch calls received.
    pub fn batch_count(&self) -> usize {
        self.faults.lock().batch_calls
    }

    /// Handles a request descriptor directly.
    pub fn handle_request(&self, request: &RequestDescriptor) -> ResponseEnvelope {
        self.log
            .lock()
            .push(format!("{} {}", request.method, request.path));

        if let Some(status) = self.injected_failure(request) {
            let e = ServerError::Injected(status);
            return ResponseEnvelope::new(status).with_body(e.to_body());
        }
        self.handler.handle(request)
    }

    fn injected_failure(&self, request: &RequestDescriptor) -> Option<u16> {
        let mut faults = self.faults.lock();
        let batch_failure = if request.method == Method::Post && request.path == batch_path() {
            let index = faults.batch_calls;
            faults.batch_calls += 1;
            faults.fail_batches.remove(&index)
        } else {
            None
        };
        faults.fail_next.pop_front().or(batch_failure)
    }

    fn directives(&self) -> Headers {
        let faults = self.faults.lock();
        let mut headers = Headers::new();
        if let Some(seconds) = faults.backoff_seconds {
            headers.insert(BACKOFF_HEADER, seconds.to_string());
        }
        if let Some(alert) = &faults.alert {
            headers.insert(ALERT_HEADER, alert.to_string());
        }
        headers
    }
}

impl LoopbackServer for MemoryServer {
    fn handle(&self, method: Method, path: &str, headers: &Headers, body: &[u8]) -> HttpResponse {
        let envelope = if body.is_empty() {
            self.handle_request(&RequestDescriptor {
                path: path.to_string(),
                method,
                headers: headers.clone(),
                body: None,
            })
        } else {
            match serde_json::from_slice::<Value>(body) {
                Ok(body) => self.handle_request(&RequestDescriptor {
                    path: path.to_string(),
                    method,
                    headers: headers.clone(),
                    body: Some(body),
                }),
                Err(e) => {
                    let e = ServerError::InvalidRequest(e.to_string());
                    ResponseEnvelope::new(e.status()).with_body(e.to_body())
                }
            }
        };

        let body = match (&envelope.body, envelope.is_not_modified()) {
            (Some(body), false) => serde_json::to_vec(body).unwrap_or_default(),
            _ => Vec::new(),
        };
        HttpResponse {
            status: envelope.status,
            headers: envelope.headers.merged(&self.directives()),
            body,
        }
    }
}
