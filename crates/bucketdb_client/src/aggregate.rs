//! Classification of batch sub-responses.

use crate::error::{ClientError, ClientResult};
use bucketdb_protocol::{RequestDescriptor, ResponseEnvelope};
use std::collections::BTreeMap;

/// Outcome category of one sub-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutcomeCategory {
    /// A resource was created (201).
    Created,
    /// A resource was written or read successfully (other 2xx).
    Updated,
    /// Nothing changed (304).
    Unchanged,
    /// A concurrency precondition failed (409, 412).
    Conflict,
    /// The target did not exist (404).
    Skipped,
    /// Any other client error (4xx).
    ClientError,
    /// Server error (5xx).
    ServerError,
    /// Any status outside the classes above.
    Unknown,
}

impl OutcomeCategory {
    /// Returns true for categories that represent a failed sub-request.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OutcomeCategory::Conflict
                | OutcomeCategory::Skipped
                | OutcomeCategory::ClientError
                | OutcomeCategory::ServerError
                | OutcomeCategory::Unknown
        )
    }
}

/// Maps status codes to outcome categories.
///
/// Explicit overrides are consulted first, then the default table:
///
/// | Status | Category |
/// | --- | --- |
/// | 201 | `Created` |
/// | other 2xx | `Updated` |
/// | 304 | `Unchanged` |
/// | 409, 412 | `Conflict` |
/// | 404 | `Skipped` |
/// | other 4xx | `ClientError` |
/// | 5xx | `ServerError` |
/// | anything else | `Unknown` |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusMapping {
    overrides: BTreeMap<u16, OutcomeCategory>,
}

impl StatusMapping {
    /// Creates the default mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `status` to `category`, overriding the default table.
    pub fn with_override(mut self, status: u16, category: OutcomeCategory) -> Self {
        self.overrides.insert(status, category);
        self
    }

    /// Classifies a status code.
    pub fn classify(&self, status: u16) -> OutcomeCategory {
        if let Some(category) = self.overrides.get(&status) {
            return *category;
        }
        match status {
            201 => OutcomeCategory::Created,
            200..=299 => OutcomeCategory::Updated,
            304 => OutcomeCategory::Unchanged,
            409 | 412 => OutcomeCategory::Conflict,
            404 => OutcomeCategory::Skipped,
            400..=499 => OutcomeCategory::ClientError,
            500..=599 => OutcomeCategory::ServerError,
            _ => OutcomeCategory::Unknown,
        }
    }
}

/// One sub-request paired with its response.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedEntry {
    /// Position of the pair in the original batch.
    pub index: usize,
    /// The sub-request.
    pub request: RequestDescriptor,
    /// Its response.
    pub response: ResponseEnvelope,
}

/// Batch results grouped by outcome category.
///
/// Within a category, entries keep their original relative order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedResult {
    categories: BTreeMap<OutcomeCategory, Vec<AggregatedEntry>>,
}

impl AggregatedResult {
    /// Returns the entries in a category (empty if none).
    pub fn get(&self, category: OutcomeCategory) -> &[AggregatedEntry] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the number of entries across every category.
    pub fn total(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Returns true if any entry landed in a failure category.
    pub fn has_failures(&self) -> bool {
        self.categories
            .iter()
            .any(|(category, entries)| category.is_failure() && !entries.is_empty())
    }

    /// Iterates over non-empty categories.
    pub fn iter(&self) -> impl Iterator<Item = (OutcomeCategory, &[AggregatedEntry])> {
        self.categories
            .iter()
            .map(|(category, entries)| (*category, entries.as_slice()))
    }

    /// Returns every entry, ordered by original position.
    pub fn into_ordered(self) -> Vec<AggregatedEntry> {
        let mut entries: Vec<_> = self.categories.into_values().flatten().collect();
        entries.sort_by_key(|entry| entry.index);
        entries
    }
}

/// Pairs responses with requests by position and classifies each pair.
///
/// The two lists must have the same length; a mismatch means the ordering
/// contract of the batch endpoint was broken and is reported as
/// [`ClientError::PreconditionViolation`].
pub fn aggregate(
    responses: &[ResponseEnvelope],
    requests: &[RequestDescriptor],
    mapping: &StatusMapping,
) -> ClientResult<AggregatedResult> {
    if responses.len() != requests.len() {
        return Err(ClientError::PreconditionViolation {
            requests: requests.len(),
            responses: responses.len(),
        });
    }

    let mut result = AggregatedResult::default();
    for (index, (response, request)) in responses.iter().zip(requests).enumerate() {
        result
            .categories
            .entry(mapping.classify(response.status))
            .or_default()
            .push(AggregatedEntry {
                index,
                request: request.clone(),
                response: response.clone(),
            });
    }
    Ok(result)
}
