//! Versioned record storage.

use crate::error::{ServerError, ServerResult};
use bucketdb_protocol::{CollectionRef, SyncMarker};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Write precondition taken from `If-Match` / `If-None-Match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precondition {
    /// Unconditional write.
    #[default]
    None,
    /// The record must exist with exactly this version.
    IfMatch(SyncMarker),
    /// The record must not exist (`If-None-Match: *`).
    IfAbsent,
}

/// Record storage with a single monotonic clock.
///
/// Every write takes the next clock value as the record's `last_modified`
/// and as its collection's timestamp. Deletions leave tombstones so that
/// `records_since` reports them. [`flush`](Self::flush) drops everything
/// but keeps the clock moving, so a client holding an old marker sees a
/// newer timestamp with nothing behind it.
pub struct RecordStore {
    state: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    clock: u64,
    /// Timestamp reported for collections that hold nothing.
    reset_at: u64,
    collections: BTreeMap<(String, String), CollectionState>,
}

#[derive(Default)]
struct CollectionState {
    timestamp: u64,
    /// Live records and tombstones by id.
    records: BTreeMap<String, Value>,
}

fn key(collection: &CollectionRef) -> (String, String) {
    (collection.bucket.clone(), collection.collection.clone())
}

fn last_modified(record: &Value) -> u64 {
    record
        .get("last_modified")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn is_tombstone(record: &Value) -> bool {
    record.get("deleted").and_then(Value::as_bool) == Some(true)
}

impl RecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Returns the current clock value.
    pub fn clock(&self) -> u64 {
        self.state.read().clock
    }

    /// Returns the timestamp of a collection.
    pub fn timestamp(&self, collection: &CollectionRef) -> SyncMarker {
        let state = self.state.read();
        let timestamp = state
            .collections
            .get(&key(collection))
            .map(|c| c.timestamp)
            .unwrap_or(state.reset_at);
        SyncMarker::new(timestamp)
    }

    /// Returns a live record.
    pub fn get(&self, collection: &CollectionRef, id: &str) -> Option<Value> {
        self.state
            .read()
            .collections
            .get(&key(collection))
            .and_then(|c| c.records.get(id))
            .filter(|record| !is_tombstone(record))
            .cloned()
    }

    /// Returns the number of live records in a collection.
    pub fn len(&self, collection: &CollectionRef) -> usize {
        self.state
            .read()
            .collections
            .get(&key(collection))
            .map(|c| c.records.values().filter(|r| !is_tombstone(r)).count())
            .unwrap_or(0)
    }

    /// Returns records ordered by `last_modified`, with the collection
    /// timestamp.
    ///
    /// Without `since`, only live records are returned. With `since`,
    /// every record and tombstone modified after it is returned.
    pub fn records_since(
        &self,
        collection: &CollectionRef,
        since: Option<SyncMarker>,
    ) -> (Vec<Value>, SyncMarker) {
        let state = self.state.read();
        let Some(entry) = state.collections.get(&key(collection)) else {
            return (Vec::new(), SyncMarker::new(state.reset_at));
        };

        let mut records: Vec<Value> = entry
            .records
            .values()
            .filter(|record| match since {
                Some(marker) => last_modified(record) > marker.value(),
                None => !is_tombstone(record),
            })
            .cloned()
            .collect();
        records.sort_by_key(last_modified);
        (records, SyncMarker::new(entry.timestamp))
    }

    /// Creates or replaces a record.
    ///
    /// Returns whether the record was created, and the stored record.
    pub fn put(
        &self,
        collection: &CollectionRef,
        id: &str,
        data: Map<String, Value>,
        precondition: Precondition,
    ) -> ServerResult<(bool, Value)> {
        let mut state = self.state.write();
        let existing = state
            .collections
            .get(&key(collection))
            .and_then(|c| c.records.get(id))
            .filter(|record| !is_tombstone(record))
            .map(last_modified);
        check(id, existing, precondition)?;

        state.clock += 1;
        let now = state.clock;
        let mut record = data;
        record.insert("id".into(), json!(id));
        record.insert("last_modified".into(), json!(now));
        let record = Value::Object(record);

        let entry = state.collections.entry(key(collection)).or_default();
        entry.timestamp = now;
        entry.records.insert(id.to_string(), record.clone());
        Ok((existing.is_none(), record))
    }

    /// Deletes a record, leaving a tombstone.
    pub fn delete(
        &self,
        collection: &CollectionRef,
        id: &str,
        precondition: Precondition,
    ) -> ServerResult<Value> {
        let mut state = self.state.write();
        let existing = state
            .collections
            .get(&key(collection))
            .and_then(|c| c.records.get(id))
            .filter(|record| !is_tombstone(record))
            .map(last_modified);
        if existing.is_none() {
            return Err(ServerError::NotFound(format!("record {collection}/{id}")));
        }
        check(id, existing, precondition)?;

        state.clock += 1;
        let now = state.clock;
        let tombstone = json!({"id": id, "deleted": true, "last_modified": now});

        let entry = state.collections.entry(key(collection)).or_default();
        entry.timestamp = now;
        entry.records.insert(id.to_string(), tombstone.clone());
        Ok(tombstone)
    }

    /// Drops every record, tombstone and collection.
    pub fn flush(&self) {
        let mut state = self.state.write();
        state.clock += 1;
        state.reset_at = state.clock;
        state.collections.clear();
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn check(id: &str, existing: Option<u64>, precondition: Precondition) -> ServerResult<()> {
    match (precondition, existing) {
        (Precondition::None, _) => Ok(()),
        (Precondition::IfAbsent, None) => Ok(()),
        (Precondition::IfAbsent, Some(_)) => Err(ServerError::PreconditionFailed(format!(
            "record {id} already exists"
        ))),
        (Precondition::IfMatch(expected), Some(current)) if current == expected.value() => Ok(()),
        (Precondition::IfMatch(expected), _) => Err(ServerError::PreconditionFailed(format!(
            "record {id} is not at version {expected}"
        ))),
    }
}
