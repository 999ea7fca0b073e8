//! Bodies of the `/batch` endpoint.

use crate::error::{ProtocolError, ProtocolResult};
use crate::request::{Headers, RequestDescriptor};
use crate::response::ResponseEnvelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Values the server applies to every sub-request of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchDefaults {
    /// Headers merged into each sub-request.
    #[serde(default)]
    pub headers: Headers,
}

/// Body of a physical batch request.
///
/// The order of `requests` determines the order of the responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Shared defaults.
    pub defaults: BatchDefaults,
    /// Sub-requests in submission order.
    pub requests: Vec<RequestDescriptor>,
}

impl BatchRequest {
    /// Creates a batch body with the given default headers.
    pub fn new(headers: Headers, requests: Vec<RequestDescriptor>) -> Self {
        Self {
            defaults: BatchDefaults { headers },
            requests,
        }
    }

    /// Returns the number of sub-requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns true if there are no sub-requests.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Serializes the body to a JSON value.
    pub fn to_value(&self) -> ProtocolResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| ProtocolError::malformed("batch request", e.to_string()))
    }
}

/// Body of a successful batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Sub-responses, one per submitted sub-request, in submission order.
    pub responses: Vec<ResponseEnvelope>,
}

impl BatchResponse {
    /// Reads a batch response out of a parsed body.
    ///
    /// A missing body or a body without a `responses` array is malformed.
    pub fn from_body(body: Option<&Value>) -> ProtocolResult<Self> {
        let body = body.ok_or_else(|| ProtocolError::malformed("batch response", "empty body"))?;
        if !body.get("responses").is_some_and(Value::is_array) {
            return Err(ProtocolError::malformed(
                "batch response",
                "missing responses array",
            ));
        }
        Self::deserialize(body)
            .map_err(|e| ProtocolError::malformed("batch response", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_shape() {
        let headers: Headers = [("Authorization", "Bearer t")].into_iter().collect();
        let batch = BatchRequest::new(
            headers,
            vec![
                RequestDescriptor::delete("/buckets/a"),
                RequestDescriptor::put("/buckets/b", json!({"data": {}})),
            ],
        );

        let value = batch.to_value().unwrap();
        assert_eq!(value["defaults"]["headers"]["Authorization"], "Bearer t");
        assert_eq!(value["requests"][0]["path"], "/buckets/a");
        assert_eq!(value["requests"][1]["method"], "PUT");
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn response_body_keeps_order() {
        let body = json!({"responses": [
            {"status": 201, "path": "/a", "body": {"data": {"id": "a"}}, "headers": {}},
            {"status": 412, "path": "/b", "body": {}, "headers": {"ETag": "\"3\""}},
        ]});

        let response = BatchResponse::from_body(Some(&body)).unwrap();
        assert_eq!(response.responses.len(), 2);
        assert_eq!(response.responses[0].status, 201);
        assert_eq!(response.responses[1].header("etag"), Some("\"3\""));
    }

    #[test]
    fn response_body_without_array_is_malformed() {
        assert!(BatchResponse::from_body(None).is_err());
        assert!(BatchResponse::from_body(Some(&json!({"data": []}))).is_err());
        assert!(BatchResponse::from_body(Some(&json!({"responses": {}}))).is_err());
    }
}
