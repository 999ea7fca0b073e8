//! Memoized server settings.

use crate::error::ClientResult;
use crate::executor::RequestExecutor;
use bucketdb_protocol::{root_path, Headers, RequestDescriptor, ServerInfo, ServerSettings};
use parking_lot::RwLock;
use std::sync::Arc;

/// Caches the server root document for the lifetime of a client.
///
/// The first call fetches `GET /`; later calls are answered from memory.
/// The lock is never held while a request is in flight, so concurrent
/// first calls may each fetch. The last one to finish wins, and since the
/// server returns the same document the cache stays consistent. A failed
/// fetch leaves the cache empty.
#[derive(Debug, Default)]
pub struct ServerSettingsCache {
    info: RwLock<Option<Arc<ServerInfo>>>,
}

impl ServerSettingsCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the server root document, fetching it on first use.
    pub fn server_info<E>(&self, executor: &E, headers: &Headers) -> ClientResult<Arc<ServerInfo>>
    where
        E: RequestExecutor + ?Sized,
    {
        if let Some(info) = self.cached_info() {
            return Ok(info);
        }

        let mut request = RequestDescriptor::get(root_path());
        request.headers = headers.clone();
        let envelope = executor.execute(&request)?;
        let info = Arc::new(ServerInfo::from_body(envelope.body.as_ref())?);
        tracing::debug!(
            batch_max_requests = ?info.settings.batch_max_requests,
            "fetched server settings"
        );

        *self.info.write() = Some(Arc::clone(&info));
        Ok(info)
    }

    /// Returns the server settings, fetching them on first use.
    pub fn get<E>(&self, executor: &E, headers: &Headers) -> ClientResult<ServerSettings>
    where
        E: RequestExecutor + ?Sized,
    {
        Ok(self.server_info(executor, headers)?.settings.clone())
    }

    /// Returns the cached root document without any I/O.
    pub fn cached_info(&self) -> Option<Arc<ServerInfo>> {
        self.info.read().clone()
    }

    /// Returns the cached settings without any I/O.
    pub fn cached(&self) -> Option<ServerSettings> {
        self.cached_info().map(|info| info.settings.clone())
    }
}
