//! # BucketDB Testkit
//!
//! In-memory reference server and test utilities for BucketDB.
//!
//! This crate provides:
//! - A server speaking the root, batch and record endpoints
//! - Versioned record storage with tombstones and flushing
//! - Injection of backoff directives, alerts and failures
//! - Property-based test generators using proptest
//!
//! # Architecture
//!
//! [`MemoryServer`] implements the client's loopback server seam, so an
//! `HttpExecutor` over a `LoopbackClient` talks to it as it would to a
//! remote store. It maintains:
//! - A single clock that versions every write
//! - Per-collection timestamps served as entity tags
//! - The batch limit published in the root settings, enforced on `/batch`
//!
//! # Protocol
//!
//! - `GET /` returns the server info document
//! - `POST /batch` runs sub-requests in order, refusing oversized batches
//! - `GET .../records` honours `_since` and answers `If-None-Match` with 304
//! - `PUT`/`DELETE .../records/{id}` honour `If-Match` and `If-None-Match: *`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod generators;
mod handler;
mod server;
mod store;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::MemoryServer;
pub use store::{Precondition, RecordStore};
