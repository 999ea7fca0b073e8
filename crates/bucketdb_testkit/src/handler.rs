//! Request handlers for the store endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::{Precondition, RecordStore};
use bucketdb_protocol::{
    BatchRequest, CollectionRef, Method, RequestDescriptor, ResponseEnvelope, ServerInfo,
    SyncMarker,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Record storage (shared across all handlers).
    pub store: Arc<RecordStore>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<RecordStore>) -> Self {
        Self { config, store }
    }
}

/// A parsed request target.
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Root,
    Batch,
    Records(CollectionRef),
    Record(CollectionRef, String),
}

fn parse_route(path: &str) -> ServerResult<Route> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        [""] => Ok(Route::Root),
        ["batch"] => Ok(Route::Batch),
        ["buckets", bucket, "collections", collection, "records"] => {
            Ok(Route::Records(CollectionRef::new(*bucket, *collection)))
        }
        ["buckets", bucket, "collections", collection, "records", id] if !id.is_empty() => Ok(
            Route::Record(CollectionRef::new(*bucket, *collection), (*id).to_string()),
        ),
        _ => Err(ServerError::NotFound(path.to_string())),
    }
}

/// Reads `_since` out of a query string.
fn since_of(query: Option<&str>) -> ServerResult<Option<SyncMarker>> {
    let Some(query) = query else {
        return Ok(None);
    };
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("_since=") {
            let marker = SyncMarker::from_entity_tag(value)
                .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
            return Ok(Some(marker));
        }
    }
    Ok(None)
}

fn precondition_of(request: &RequestDescriptor) -> ServerResult<Precondition> {
    if let Some(tag) = request.headers.get("If-Match") {
        let marker = SyncMarker::from_entity_tag(tag)
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
        return Ok(Precondition::IfMatch(marker));
    }
    match request.headers.get("If-None-Match") {
        Some("*") => Ok(Precondition::IfAbsent),
        Some(other) => Err(ServerError::InvalidRequest(format!(
            "unsupported If-None-Match on write: {other}"
        ))),
        None => Ok(Precondition::None),
    }
}

/// Handler for store requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles one request, turning errors into error responses.
    pub fn handle(&self, request: &RequestDescriptor) -> ResponseEnvelope {
        match self.route(request) {
            Ok(response) => response,
            Err(e) => {
                debug!(path = %request.path, status = e.status(), error = %e, "request failed");
                ResponseEnvelope::new(e.status()).with_body(e.to_body())
            }
        }
    }

    fn route(&self, request: &RequestDescriptor) -> ServerResult<ResponseEnvelope> {
        let (path, query) = match request.path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (request.path.as_str(), None),
        };

        match (parse_route(path)?, request.method) {
            (Route::Root, Method::Get) => self.handle_root(),
            (Route::Batch, Method::Post) => self.handle_batch(request),
            (Route::Records(collection), Method::Get) => {
                self.handle_list(request, &collection, since_of(query)?)
            }
            (Route::Record(collection, id), Method::Get) => self.handle_get(&collection, &id),
            (Route::Record(collection, id), Method::Put) => {
                self.handle_put(request, &collection, &id)
            }
            (Route::Record(collection, id), Method::Delete) => {
                self.handle_delete(request, &collection, &id)
            }
            (_, method) => Err(ServerError::MethodNotAllowed(format!("{method} {path}"))),
        }
    }

    fn handle_root(&self) -> ServerResult<ResponseEnvelope> {
        let config = &self.context.config;
        let info = ServerInfo {
            project_name: Some(config.project_name.clone()),
            project_version: Some(config.project_version.clone()),
            http_api_version: Some(config.http_api_version.clone()),
            url: None,
            capabilities: config
                .capabilities
                .iter()
                .map(|name| (name.clone(), json!({})))
                .collect(),
            settings: config.settings(),
        };
        let body =
            serde_json::to_value(info).map_err(|e| ServerError::Internal(e.to_string()))?;
        Ok(ResponseEnvelope::new(200).with_body(body))
    }

    fn handle_batch(&self, request: &RequestDescriptor) -> ServerResult<ResponseEnvelope> {
        let body = request
            .body
            .clone()
            .ok_or_else(|| ServerError::InvalidRequest("batch without body".into()))?;
        let batch: BatchRequest = serde_json::from_value(body)
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;

        if let Some(limit) = self.context.config.batch_max_requests {
            if batch.len() > limit {
                return Err(ServerError::InvalidRequest(format!(
                    "too many requests: {} > {}",
                    batch.len(),
                    limit
                )));
            }
        }
        debug!(requests = batch.len(), "handling batch");

        let mut responses = Vec::with_capacity(batch.len());
        for sub in batch.requests {
            let sub = sub.with_default_headers(&batch.defaults.headers);
            let response = if sub.path.trim_end_matches('/') == "/batch" {
                let e = ServerError::InvalidRequest("recursive batch".into());
                ResponseEnvelope::new(e.status()).with_body(e.to_body())
            } else {
                self.handle(&sub)
            };
            let mut value = serde_json::to_value(response)
                .map_err(|e| ServerError::Internal(e.to_string()))?;
            if let Some(object) = value.as_object_mut() {
                object.insert("path".into(), json!(sub.path));
            }
            responses.push(value);
        }
        Ok(ResponseEnvelope::new(200).with_body(json!({ "responses": responses })))
    }

    fn handle_list(
        &self,
        request: &RequestDescriptor,
        collection: &CollectionRef,
        since: Option<SyncMarker>,
    ) -> ServerResult<ResponseEnvelope> {
        let current = self.context.store.timestamp(collection);
        if let Some(tag) = request.headers.get("If-None-Match") {
            if SyncMarker::from_entity_tag(tag).ok() == Some(current) {
                return Ok(ResponseEnvelope::new(304).with_header("ETag", current.to_entity_tag()));
            }
        }

        let (records, timestamp) = self.context.store.records_since(collection, since);
        Ok(ResponseEnvelope::new(200)
            .with_header("ETag", timestamp.to_entity_tag())
            .with_body(json!({ "data": records })))
    }

    fn handle_get(&self, collection: &CollectionRef, id: &str) -> ServerResult<ResponseEnvelope> {
        let record = self
            .context
            .store
            .get(collection, id)
            .ok_or_else(|| ServerError::NotFound(format!("record {collection}/{id}")))?;
        Ok(record_response(200, record))
    }

    fn handle_put(
        &self,
        request: &RequestDescriptor,
        collection: &CollectionRef,
        id: &str,
    ) -> ServerResult<ResponseEnvelope> {
        if self.context.config.readonly {
            return Err(ServerError::Readonly);
        }
        let data = match request.body.as_ref().and_then(|body| body.get("data")) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(data)) => data.clone(),
            Some(_) => return Err(ServerError::InvalidRequest("data is not an object".into())),
        };

        let (created, record) =
            self.context
                .store
                .put(collection, id, data, precondition_of(request)?)?;
        Ok(record_response(if created { 201 } else { 200 }, record))
    }

    fn handle_delete(
        &self,
        request: &RequestDescriptor,
        collection: &CollectionRef,
        id: &str,
    ) -> ServerResult<ResponseEnvelope> {
        if self.context.config.readonly {
            return Err(ServerError::Readonly);
        }
        let tombstone = self
            .context
            .store
            .delete(collection, id, precondition_of(request)?)?;
        Ok(record_response(200, tombstone))
    }
}

fn record_response(status: u16, record: Value) -> ResponseEnvelope {
    let version = record
        .get("last_modified")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    ResponseEnvelope::new(status)
        .with_header("ETag", SyncMarker::new(version).to_entity_tag())
        .with_body(json!({ "data": record }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(config: ServerConfig) -> RequestHandler {
        let context = HandlerContext::new(config, Arc::new(RecordStore::new()));
        RequestHandler::new(Arc::new(context))
    }

    const RECORDS: &str = "/buckets/main/collections/tasks/records";

    #[test]
    fn routes() {
        assert_eq!(parse_route("/").unwrap(), Route::Root);
        assert_eq!(parse_route("/batch").unwrap(), Route::Batch);
        assert_eq!(
            parse_route(RECORDS).unwrap(),
            Route::Records(CollectionRef::new("main", "tasks"))
        );
        assert_eq!(
            parse_route(&format!("{RECORDS}/a")).unwrap(),
            Route::Record(CollectionRef::new("main", "tasks"), "a".into())
        );
        assert!(parse_route("/buckets/main").is_err());
    }

    #[test]
    fn root_publishes_settings() {
        let handler = handler(ServerConfig::new(Some(3)).with_capability("history"));
        let response = handler.handle(&RequestDescriptor::get("/"));

        let info = ServerInfo::from_body(response.body.as_ref()).unwrap();
        assert_eq!(info.settings.batch_limit(), Some(3));
        assert!(info.has_capability("history"));
    }

    #[test]
    fn put_then_list() {
        let handler = handler(ServerConfig::default());
        let put = RequestDescriptor::put(format!("{RECORDS}/a"), json!({"data": {"n": 1}}));
        assert_eq!(handler.handle(&put).status, 201);
        assert_eq!(handler.handle(&put).status, 200);

        let list = handler.handle(&RequestDescriptor::get(RECORDS));
        assert_eq!(list.status, 200);
        assert_eq!(list.header("ETag"), Some("\"2\""));
        assert_eq!(list.body.unwrap()["data"][0]["n"], 1);
    }

    #[test]
    fn list_answers_not_modified() {
        let handler = handler(ServerConfig::default());
        handler.handle(&RequestDescriptor::put(format!("{RECORDS}/a"), json!({})));

        let request =
            RequestDescriptor::get(format!("{RECORDS}?_since=1")).with_header("If-None-Match", "\"1\"");
        assert_eq!(handler.handle(&request).status, 304);

        let request =
            RequestDescriptor::get(format!("{RECORDS}?_since=0")).with_header("If-None-Match", "\"0\"");
        assert_eq!(handler.handle(&request).status, 200);
    }

    #[test]
    fn batch_enforces_limit() {
        let handler = handler(ServerConfig::new(Some(2)));
        let requests: Vec<_> = (0..3)
            .map(|i| RequestDescriptor::put(format!("{RECORDS}/r{i}"), json!({})))
            .collect();
        let body = BatchRequest::new(Default::default(), requests).to_value().unwrap();

        let response = handler.handle(&RequestDescriptor::post("/batch", body));
        assert_eq!(response.status, 400);
    }

    #[test]
    fn batch_applies_defaults_and_keeps_order() {
        let handler = handler(ServerConfig::default());
        handler.handle(&RequestDescriptor::put(format!("{RECORDS}/a"), json!({})));

        let requests = vec![
            RequestDescriptor::put(format!("{RECORDS}/a"), json!({})),
            RequestDescriptor::put(format!("{RECORDS}/b"), json!({})),
            RequestDescriptor::delete(format!("{RECORDS}/missing")),
        ];
        let defaults = [("If-None-Match", "*")].into_iter().collect();
        let body = BatchRequest::new(defaults, requests).to_value().unwrap();

        let response = handler.handle(&RequestDescriptor::post("/batch", body));
        assert_eq!(response.status, 200);
        let responses = response.body.unwrap()["responses"].clone();
        let statuses: Vec<_> = responses
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["status"].as_u64().unwrap())
            .collect();
        assert_eq!(statuses, vec![412, 201, 404]);
        assert_eq!(responses[1]["path"], format!("{RECORDS}/b"));
    }

    #[test]
    fn readonly_refuses_writes() {
        let handler = handler(ServerConfig::default().with_readonly());
        let put = RequestDescriptor::put(format!("{RECORDS}/a"), json!({}));
        assert_eq!(handler.handle(&put).status, 405);
    }

    #[test]
    fn unknown_route() {
        let handler = handler(ServerConfig::default());
        assert_eq!(handler.handle(&RequestDescriptor::get("/nope")).status, 404);
        assert_eq!(handler.handle(&RequestDescriptor::delete("/")).status, 405);
    }
}
