//! # BucketDB Client
//!
//! Client core for the BucketDB remote store.
//!
//! This crate provides:
//! - Batched request execution within the server's batch limit
//! - Classification of batch sub-responses by outcome
//! - Conditional change polling with store-reset detection
//! - Memoized server settings
//! - Advisory tracking of server backoff directives
//! - An executor abstraction with an HTTP implementation
//!
//! ## Architecture
//!
//! Every physical request goes through a [`RequestExecutor`]. The
//! [`BatchChunker`] splits large batches into chunks the server accepts
//! and joins the responses back in order; the [`ChangeSyncEngine`] polls a
//! collection with `If-None-Match` and tells "unchanged", "changed" and
//! "reset" apart. [`RemoteClient`] bundles both with the settings cache and
//! backoff tracker that belong to one client.
//!
//! ## Key Invariants
//!
//! - Responses are returned in request order, whatever the chunking
//! - Empty batches perform no I/O
//! - Server settings are fetched at most once per client (barring races)
//! - A newer marker with no records is a reset, never "no changes"
//! - Backoff is reported, never enforced

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod aggregate;
mod backoff;
mod batch;
mod changes;
mod client;
mod config;
mod error;
mod executor;
mod http;
mod settings;

pub use aggregate::{aggregate, AggregatedEntry, AggregatedResult, OutcomeCategory, StatusMapping};
pub use backoff::{BackoffListener, BackoffNotifier, BackoffTracker};
pub use batch::{chunk_ranges, BatchChunker};
pub use changes::{ChangeSyncEngine, ChangesResult};
pub use client::RemoteClient;
pub use config::{ClientConfig, RequestOptions, ResolvedOptions, DEFAULT_BUCKET};
pub use error::{ClientError, ClientResult};
pub use executor::{ensure_success, MockExecutor, RequestExecutor};
pub use http::{
    HttpClient, HttpExecutor, HttpRequest, HttpResponse, LoopbackClient, LoopbackServer,
    ALERT_HEADER, BACKOFF_HEADER,
};
pub use settings::ServerSettingsCache;
