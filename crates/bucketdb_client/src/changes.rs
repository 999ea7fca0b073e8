//! Conditional polling of a collection's records.

use crate::config::ResolvedOptions;
use crate::error::{ClientError, ClientResult};
use crate::executor::RequestExecutor;
use crate::settings::ServerSettingsCache;
use bucketdb_protocol::{
    records_path, CollectionRef, ProtocolError, RequestDescriptor, SyncMarker,
};
use serde_json::Value;
use tracing::{debug, warn};

/// Records changed since a marker, and the marker to use next time.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangesResult {
    /// Collection state after `changes`.
    ///
    /// `None` only when no marker was supplied and the server sent no
    /// entity tag.
    pub marker: Option<SyncMarker>,
    /// Changed records in server order.
    pub changes: Vec<Value>,
}

impl ChangesResult {
    /// Returns true when nothing changed.
    pub fn is_unchanged(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Fetches collection changes with conditional requests.
pub struct ChangeSyncEngine<'a, E: RequestExecutor + ?Sized> {
    executor: &'a E,
    settings: &'a ServerSettingsCache,
}

impl<'a, E: RequestExecutor + ?Sized> ChangeSyncEngine<'a, E> {
    /// Creates an engine over an executor and a settings cache.
    pub fn new(executor: &'a E, settings: &'a ServerSettingsCache) -> Self {
        Self { executor, settings }
    }

    /// Fetches the records of `collection` changed after `marker`.
    ///
    /// With no marker, every record is returned. A 304 answer returns the
    /// input marker and no changes. If the server reports a newer marker
    /// than the one supplied but returns no records, the collection was
    /// reset on the server and [`ClientError::StoreReset`] is returned;
    /// the caller must then resync from scratch.
    pub fn fetch_changes_since(
        &self,
        collection: &CollectionRef,
        marker: Option<SyncMarker>,
        options: &ResolvedOptions,
    ) -> ClientResult<ChangesResult> {
        self.settings.get(self.executor, &options.headers)?;

        let mut request = RequestDescriptor::get(records_path(collection, marker));
        request.headers = options.headers.clone();
        if let Some(marker) = marker {
            request.headers.insert("If-None-Match", marker.to_entity_tag());
        }

        let envelope = self.executor.execute(&request)?;
        if envelope.is_not_modified() {
            debug!(%collection, marker = ?marker, "collection unchanged");
            return Ok(ChangesResult {
                marker,
                changes: Vec::new(),
            });
        }

        let remote = match envelope.header("ETag") {
            Some(tag) => Some(SyncMarker::from_entity_tag(tag)?),
            None => marker,
        };
        let changes = records_of(envelope.body)?;

        if let (Some(local), Some(remote)) = (marker, remote) {
            if remote > local && changes.is_empty() {
                warn!(%collection, %local, %remote, "remote collection was reset");
                return Err(ClientError::StoreReset {
                    collection: collection.to_string(),
                    local,
                    remote,
                });
            }
        }

        debug!(
            %collection,
            changes = changes.len(),
            marker = ?remote,
            "fetched collection changes"
        );
        Ok(ChangesResult {
            marker: remote,
            changes,
        })
    }
}

/// Reads the `data` array of a record list body. A missing body or field
/// means no records.
fn records_of(body: Option<Value>) -> ClientResult<Vec<Value>> {
    let Some(mut body) = body else {
        return Ok(Vec::new());
    };
    match body.get_mut("data").map(Value::take) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(records)) => Ok(records),
        Some(_) => Err(ProtocolError::malformed("record list", "data is not an array").into()),
    }
}
