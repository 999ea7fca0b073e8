//! Collection sync markers.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version token for the state of a collection.
///
/// The server issues markers as integers (last-modified timestamps) and
/// carries them in entity-tag headers wrapped in double quotes. Markers
/// are totally ordered: a greater marker is a newer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncMarker(u64);

impl SyncMarker {
    /// Creates a marker from its numeric value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the quoted entity-tag form, e.g. `"42"`.
    pub fn to_entity_tag(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Parses an entity tag, with or without surrounding quotes.
    pub fn from_entity_tag(tag: &str) -> ProtocolResult<Self> {
        let trimmed = tag.trim();
        let unquoted = trimmed
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(trimmed);
        unquoted
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ProtocolError::InvalidEntityTag(tag.to_string()))
    }
}

impl From<u64> for SyncMarker {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SyncMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
