//! HTTP executor.
//!
//! This module turns request descriptors into HTTP exchanges. The actual
//! HTTP client is abstracted via a trait to allow different
//! implementations (reqwest, hyper, ureq, an in-process loopback, etc.).

use crate::backoff::{BackoffListener, BackoffNotifier};
use crate::error::{ClientError, ClientResult};
use crate::executor::{ensure_success, RequestExecutor};
use bucketdb_protocol::{Headers, Method, ProtocolError, RequestDescriptor, ResponseEnvelope};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Header carrying a backoff directive, in seconds.
pub const BACKOFF_HEADER: &str = "Backoff";

/// Header carrying a deprecation or maintenance notice.
pub const ALERT_HEADER: &str = "Alert";

/// A raw HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: Headers,
    /// Encoded body.
    pub body: Option<Vec<u8>>,
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Errors are
/// connection-level failures only; any status the server sends back is a
/// successful exchange at this layer.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// Request executor speaking JSON over an [`HttpClient`].
pub struct HttpExecutor<C: HttpClient> {
    /// Base URL of the server without a trailing slash.
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Backoff directive subscribers.
    backoff: BackoffNotifier,
    /// Last transport error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpExecutor<C> {
    /// Creates a new HTTP executor.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client,
            backoff: BackoffNotifier::new(),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn build(&self, request: &RequestDescriptor) -> ClientResult<HttpRequest> {
        let mut headers = Headers::new();
        headers.insert("Accept", "application/json");
        let body = match &request.body {
            Some(body) => {
                headers.insert("Content-Type", "application/json");
                Some(serde_json::to_vec(body)?)
            }
            None => None,
        };
        Ok(HttpRequest {
            method: request.method,
            url: format!("{}{}", self.base_url, request.path),
            headers: headers.merged(&request.headers),
            body,
        })
    }

    fn inspect_headers(&self, headers: &Headers) {
        if let Some(value) = headers.get(BACKOFF_HEADER) {
            match value.trim().parse::<u64>() {
                Ok(seconds) => self.backoff.notify(seconds.saturating_mul(1000)),
                Err(_) => warn!(value, "ignoring malformed backoff header"),
            }
        }
        if let Some(alert) = headers.get(ALERT_HEADER) {
            warn!(alert, "server alert");
        }
    }
}

impl<C: HttpClient> RequestExecutor for HttpExecutor<C> {
    fn execute(&self, request: &RequestDescriptor) -> ClientResult<ResponseEnvelope> {
        let http_request = self.build(request)?;

        let response = self.client.send(http_request).map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            ClientError::transport_retryable(e)
        })?;
        *self.last_error.write() = None;

        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "request completed"
        );
        self.inspect_headers(&response.headers);

        let body = decode_body(response.status, &response.body)?;
        ensure_success(
            &request.path,
            ResponseEnvelope {
                status: response.status,
                headers: response.headers,
                body,
            },
        )
    }

    fn subscribe_backoff(&self, listener: Arc<dyn BackoffListener>) {
        self.backoff.subscribe(listener);
    }
}

/// Parses a response body.
///
/// 304 responses and empty bodies have no body. A body that is not JSON
/// is a protocol error on success statuses, and is dropped on error
/// statuses so the status itself gets reported.
fn decode_body(status: u16, bytes: &[u8]) -> ClientResult<Option<Value>> {
    if status == 304 || bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(Some(value)),
        Err(_) if status >= 400 => Ok(None),
        Err(e) => Err(ProtocolError::malformed("response body", e.to_string()).into()),
    }
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a request addressed to `path` (path and query, no host).
    fn handle(&self, method: Method, path: &str, headers: &Headers, body: &[u8]) -> HttpResponse;
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let path = path_of(&request.url);
        let body = request.body.unwrap_or_default();
        Ok(self
            .server
            .handle(request.method, path, &request.headers, &body))
    }
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for Arc<S> {
    fn handle(&self, method: Method, path: &str, headers: &Headers, body: &[u8]) -> HttpResponse {
        (**self).handle(method, path, headers, body)
    }
}

/// Extracts the path and query of an absolute URL.
fn path_of(url: &str) -> &str {
    let after_scheme = url.find("://").map(|i| &url[i + 3..]).unwrap_or(url);
    match after_scheme.find('/') {
        Some(i) => &after_scheme[i..],
        None => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffTracker;
    use serde_json::json;
    use std::collections::VecDeque;

    struct TestClient {
        responses: parking_lot::Mutex<VecDeque<Result<HttpResponse, String>>>,
        sent: parking_lot::Mutex<Vec<HttpRequest>>,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                responses: parking_lot::Mutex::new(VecDeque::new()),
                sent: parking_lot::Mutex::new(Vec::new()),
            }
        }

        fn push(&self, status: u16, headers: &[(&str, &str)], body: &str) {
            self.responses.lock().push_back(Ok(HttpResponse {
                status,
                headers: headers.iter().copied().collect(),
                body: body.as_bytes().to_vec(),
            }));
        }

        fn push_error(&self, message: &str) {
            self.responses.lock().push_back(Err(message.to_string()));
        }
    }

    impl HttpClient for TestClient {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
            self.sent.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err("No response set".into()))
        }
    }

    #[test]
    fn executor_creation() {
        let executor = HttpExecutor::new("https://store.example.com/v1/", TestClient::new());
        assert_eq!(executor.base_url(), "https://store.example.com/v1");
        assert_eq!(executor.last_error(), None);
    }

    #[test]
    fn request_is_encoded_as_json() {
        let client = TestClient::new();
        client.push(201, &[], r#"{"data": {"id": "r1"}}"#);
        let executor = HttpExecutor::new("https://store.example.com/v1", client);

        let request = RequestDescriptor::post(
            "/buckets/b/collections/c/records",
            json!({"data": {"title": "x"}}),
        )
        .with_header("If-None-Match", "*");
        let envelope = executor.execute(&request).unwrap();
        assert_eq!(envelope.status, 201);
        assert_eq!(envelope.body, Some(json!({"data": {"id": "r1"}})));

        let sent = executor.client().sent.lock();
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(
            sent[0].url,
            "https://store.example.com/v1/buckets/b/collections/c/records"
        );
        assert_eq!(sent[0].headers.get("content-type"), Some("application/json"));
        assert_eq!(sent[0].headers.get("If-None-Match"), Some("*"));
        let body: Value = serde_json::from_slice(sent[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({"data": {"title": "x"}}));
    }

    #[test]
    fn error_status_becomes_server_error() {
        let client = TestClient::new();
        client.push(412, &[], r#"{"code": 412, "message": "Resource was modified"}"#);
        let executor = HttpExecutor::new("http://localhost", client);

        let err = executor.execute(&RequestDescriptor::get("/buckets/b")).unwrap_err();
        assert_eq!(err.status(), Some(412));
        assert!(!err.is_retryable());
    }

    #[test]
    fn error_status_with_html_body_still_reports_status() {
        let client = TestClient::new();
        client.push(502, &[], "<html>Bad Gateway</html>");
        let executor = HttpExecutor::new("http://localhost", client);

        let err = executor.execute(&RequestDescriptor::get("/")).unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 502, body: None, .. }));
    }

    #[test]
    fn invalid_json_on_success_is_protocol_error() {
        let client = TestClient::new();
        client.push(200, &[], "not json");
        let executor = HttpExecutor::new("http://localhost", client);

        let err = executor.execute(&RequestDescriptor::get("/")).unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[test]
    fn not_modified_has_no_body() {
        let client = TestClient::new();
        client.push(304, &[("ETag", "\"10\"")], "garbage that is never parsed");
        let executor = HttpExecutor::new("http://localhost", client);

        let envelope = executor.execute(&RequestDescriptor::get("/x")).unwrap();
        assert!(envelope.is_not_modified());
        assert_eq!(envelope.body, None);
    }

    #[test]
    fn transport_failure_is_retryable() {
        let client = TestClient::new();
        client.push_error("connection refused");
        let executor = HttpExecutor::new("http://localhost", client);

        let err = executor.execute(&RequestDescriptor::get("/")).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(executor.last_error().as_deref(), Some("connection refused"));
    }

    #[test]
    fn backoff_header_is_published_in_millis() {
        let client = TestClient::new();
        client.push(200, &[("Backoff", "5")], "{}");
        let executor = HttpExecutor::new("http://localhost", client);
        let tracker = Arc::new(BackoffTracker::new());
        executor.subscribe_backoff(tracker.clone());

        executor.execute(&RequestDescriptor::get("/")).unwrap();
        let remaining = tracker.remaining_ms();
        assert!(remaining > 4000);
        assert!(remaining <= 5000);
    }

    #[test]
    fn malformed_backoff_header_is_ignored() {
        let client = TestClient::new();
        client.push(200, &[("Backoff", "soon")], "{}");
        let executor = HttpExecutor::new("http://localhost", client);
        let tracker = Arc::new(BackoffTracker::new());
        executor.subscribe_backoff(tracker.clone());

        executor.execute(&RequestDescriptor::get("/")).unwrap();
        assert_eq!(tracker.remaining_ms(), 0);
    }

    #[test]
    fn path_extraction() {
        assert_eq!(path_of("https://host:8888/v1/batch"), "/v1/batch");
        assert_eq!(path_of("http://host"), "/");
        assert_eq!(path_of("memory:///buckets?_since=3"), "/buckets?_since=3");
        assert_eq!(path_of("/relative"), "/relative");
    }
}
