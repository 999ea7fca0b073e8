//! The remote store client.

use crate::aggregate::{aggregate, AggregatedResult, StatusMapping};
use crate::backoff::BackoffTracker;
use crate::batch::BatchChunker;
use crate::changes::{ChangeSyncEngine, ChangesResult};
use crate::config::{ClientConfig, RequestOptions};
use crate::error::ClientResult;
use crate::executor::RequestExecutor;
use crate::http::{HttpClient, HttpExecutor};
use crate::settings::ServerSettingsCache;
use bucketdb_protocol::{
    CollectionRef, RequestDescriptor, ResponseEnvelope, ServerInfo, ServerSettings, SyncMarker,
};
use std::sync::Arc;

/// Client for one remote store.
///
/// Owns the settings cache and the backoff tracker for its lifetime. The
/// tracker is registered with the executor's backoff channel once, at
/// construction.
pub struct RemoteClient<E: RequestExecutor> {
    config: ClientConfig,
    executor: Arc<E>,
    settings: ServerSettingsCache,
    backoff: Arc<BackoffTracker>,
    status_mapping: StatusMapping,
}

impl<E: RequestExecutor> RemoteClient<E> {
    /// Creates a new client.
    pub fn new(config: ClientConfig, executor: E) -> Self {
        Self::with_shared_executor(config, Arc::new(executor))
    }

    /// Creates a client over an executor shared with other owners.
    pub fn with_shared_executor(config: ClientConfig, executor: Arc<E>) -> Self {
        let backoff = Arc::new(BackoffTracker::new());
        executor.subscribe_backoff(backoff.clone());
        Self {
            config,
            executor,
            settings: ServerSettingsCache::new(),
            backoff,
            status_mapping: StatusMapping::default(),
        }
    }

    /// Replaces the status mapping used by [`batch_aggregate`](Self::batch_aggregate).
    pub fn with_status_mapping(mut self, mapping: StatusMapping) -> Self {
        self.status_mapping = mapping;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Returns the server root document, fetched once per client.
    pub fn server_info(&self) -> ClientResult<Arc<ServerInfo>> {
        self.settings
            .server_info(self.executor.as_ref(), &self.config.headers)
    }

    /// Returns the server settings, fetched once per client.
    pub fn server_settings(&self) -> ClientResult<ServerSettings> {
        self.settings.get(self.executor.as_ref(), &self.config.headers)
    }

    /// Runs sub-requests as one or more batches and returns their
    /// responses in request order.
    ///
    /// See [`BatchChunker::run`] for how failures of multi-chunk batches
    /// are reported.
    pub fn batch(
        &self,
        requests: &[RequestDescriptor],
        options: &RequestOptions,
    ) -> ClientResult<Vec<ResponseEnvelope>> {
        let options = self.config.resolve(options);
        BatchChunker::new(self.executor.as_ref(), &self.settings).run(requests, &options)
    }

    /// Runs a batch and classifies the responses by outcome.
    pub fn batch_aggregate(
        &self,
        requests: &[RequestDescriptor],
        options: &RequestOptions,
    ) -> ClientResult<AggregatedResult> {
        let responses = self.batch(requests, options)?;
        aggregate(&responses, requests, &self.status_mapping)
    }

    /// Fetches records of `collection` (in the configured bucket unless
    /// `options` names one) changed after `marker`.
    pub fn fetch_changes_since(
        &self,
        collection: &str,
        marker: Option<SyncMarker>,
        options: &RequestOptions,
    ) -> ClientResult<ChangesResult> {
        let options = self.config.resolve(options);
        let collection = CollectionRef::new(options.bucket.clone(), collection);
        ChangeSyncEngine::new(self.executor.as_ref(), &self.settings).fetch_changes_since(
            &collection,
            marker,
            &options,
        )
    }

    /// Milliseconds the server asked clients to wait before the next
    /// request; zero when no backoff is active.
    pub fn remaining_backoff_ms(&self) -> u64 {
        self.backoff.remaining_ms()
    }

    /// Returns the backoff tracker.
    pub fn backoff_tracker(&self) -> &BackoffTracker {
        &self.backoff
    }
}

impl<C: HttpClient> RemoteClient<HttpExecutor<C>> {
    /// Creates a client speaking HTTP to `config.server_url` through `client`.
    pub fn connect(config: ClientConfig, client: C) -> Self {
        let executor = HttpExecutor::new(config.server_url.clone(), client);
        Self::new(config, executor)
    }
}
