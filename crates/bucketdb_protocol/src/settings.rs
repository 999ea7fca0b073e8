//! Server root document and operational settings.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Operational limits reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Maximum number of sub-requests in one physical batch.
    ///
    /// `None` means the server enforces no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_max_requests: Option<usize>,
    /// Whether the server rejects writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    /// Every other setting, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ServerSettings {
    /// Creates settings with the given batch limit.
    pub fn with_batch_limit(limit: usize) -> Self {
        Self {
            batch_max_requests: Some(limit),
            ..Self::default()
        }
    }

    /// Returns the usable batch limit.
    ///
    /// A missing or zero limit means "no limit" and yields `None`.
    pub fn batch_limit(&self) -> Option<usize> {
        self.batch_max_requests.filter(|limit| *limit > 0)
    }
}

/// The document served at the API root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Project name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Server version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_version: Option<String>,
    /// HTTP API version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_api_version: Option<String>,
    /// Public URL of the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Enabled server capabilities, keyed by name.
    #[serde(default)]
    pub capabilities: BTreeMap<String, Value>,
    /// Operational settings.
    #[serde(default)]
    pub settings: ServerSettings,
}

impl ServerInfo {
    /// Reads the root document out of a parsed body.
    pub fn from_body(body: Option<&Value>) -> ProtocolResult<Self> {
        let body = body.ok_or_else(|| ProtocolError::malformed("server info", "empty body"))?;
        if !body.is_object() {
            return Err(ProtocolError::malformed("server info", "expected an object"));
        }
        Self::deserialize(body)
            .map_err(|e| ProtocolError::malformed("server info", e.to_string()))
    }

    /// Returns true if the server advertises a capability.
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_root_document() {
        let body = json!({
            "project_name": "bucketdb",
            "project_version": "14.0.0",
            "http_api_version": "1.22",
            "url": "https://store.example.com/v1/",
            "capabilities": {"history": {"description": "Track changes"}},
            "settings": {"batch_max_requests": 25, "readonly": false, "explicit_permissions": true}
        });

        let info = ServerInfo::from_body(Some(&body)).unwrap();
        assert_eq!(info.project_version.as_deref(), Some("14.0.0"));
        assert!(info.has_capability("history"));
        assert!(!info.has_capability("attachments"));
        assert_eq!(info.settings.batch_limit(), Some(25));
        assert_eq!(info.settings.readonly, Some(false));
        assert_eq!(info.settings.extra["explicit_permissions"], json!(true));
    }

    #[test]
    fn zero_or_missing_limit_means_unlimited() {
        assert_eq!(ServerSettings::default().batch_limit(), None);
        assert_eq!(ServerSettings::with_batch_limit(0).batch_limit(), None);
        assert_eq!(ServerSettings::with_batch_limit(3).batch_limit(), Some(3));
    }

    #[test]
    fn root_without_settings_is_accepted() {
        let info = ServerInfo::from_body(Some(&json!({}))).unwrap();
        assert_eq!(info.settings, ServerSettings::default());
        assert!(ServerInfo::from_body(Some(&json!([1, 2]))).is_err());
        assert!(ServerInfo::from_body(None).is_err());
    }
}
