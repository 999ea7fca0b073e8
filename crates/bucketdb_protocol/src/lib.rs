//! # BucketDB Protocol
//!
//! Wire types for the BucketDB HTTP API.
//!
//! This crate provides:
//! - `RequestDescriptor` and `ResponseEnvelope` for single requests
//! - Batch request/response bodies for the `/batch` endpoint
//! - Server info and settings documents
//! - `SyncMarker` and its quoted entity-tag form
//! - Endpoint paths for the resources the client core touches
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod endpoints;
mod error;
mod marker;
mod request;
mod response;
mod settings;

pub use batch::{BatchDefaults, BatchRequest, BatchResponse};
pub use endpoints::{batch_path, records_path, root_path, CollectionRef};
pub use error::{ProtocolError, ProtocolResult};
pub use marker::SyncMarker;
pub use request::{Headers, Method, RequestDescriptor};
pub use response::ResponseEnvelope;
pub use settings::{ServerInfo, ServerSettings};
