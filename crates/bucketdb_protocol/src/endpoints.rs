//! Endpoint paths used by the client core.

use crate::marker::SyncMarker;
use std::fmt;

/// Identifies a collection inside a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    /// Bucket name.
    pub bucket: String,
    /// Collection name.
    pub collection: String,
}

impl CollectionRef {
    /// Creates a collection reference.
    pub fn new(bucket: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.collection)
    }
}

/// Path of the server root document.
pub fn root_path() -> &'static str {
    "/"
}

/// Path of the batch endpoint.
pub fn batch_path() -> &'static str {
    "/batch"
}

/// Path of a collection's record list, optionally filtered to changes
/// after `since`.
pub fn records_path(collection: &CollectionRef, since: Option<SyncMarker>) -> String {
    let base = format!(
        "/buckets/{}/collections/{}/records",
        collection.bucket, collection.collection
    );
    match since {
        Some(marker) => format!("{base}?_since={marker}"),
        None => base,
    }
}
