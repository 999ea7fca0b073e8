//! Batch chunking and execution.
//!
//! A batch of any size is split into contiguous index ranges no larger
//! than the server's `batch_max_requests`, each range is sent as one
//! physical `POST /batch`, and the per-chunk response lists are joined
//! back in chunk order. Ranges are computed up front, so the output has
//! the same length and index correspondence as the input no matter how
//! many physical requests were needed.

use crate::config::ResolvedOptions;
use crate::error::{ClientError, ClientResult};
use crate::executor::RequestExecutor;
use crate::settings::ServerSettingsCache;
use bucketdb_protocol::{
    batch_path, BatchRequest, BatchResponse, Headers, RequestDescriptor, ResponseEnvelope,
};
use std::ops::Range;
use tracing::{debug, warn};

/// Splits `len` items into contiguous ranges of at most `limit` items.
///
/// `None` (no limit) yields a single range. An empty input yields no
/// ranges.
pub fn chunk_ranges(len: usize, limit: Option<usize>) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let size = match limit {
        Some(limit) if limit > 0 => limit,
        _ => len,
    };
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

/// Executes batches of sub-requests within the server's batch limit.
pub struct BatchChunker<'a, E: RequestExecutor + ?Sized> {
    executor: &'a E,
    settings: &'a ServerSettingsCache,
}

impl<'a, E: RequestExecutor + ?Sized> BatchChunker<'a, E> {
    /// Creates a chunker over an executor and a settings cache.
    pub fn new(executor: &'a E, settings: &'a ServerSettingsCache) -> Self {
        Self { executor, settings }
    }

    /// Runs `requests` and returns one response per request, in order.
    ///
    /// An empty input returns immediately without any I/O. When the batch
    /// needs more than one chunk and a chunk fails, the error is a
    /// [`ClientError::PartialBatch`]: chunks that succeeded before the
    /// failure, or alongside it in the same parallel wave, stay applied on
    /// the server. No further chunks are started after a failure.
    pub fn run(
        &self,
        requests: &[RequestDescriptor],
        options: &ResolvedOptions,
    ) -> ClientResult<Vec<ResponseEnvelope>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self
            .settings
            .get(self.executor, &options.headers)?
            .batch_limit();
        let ranges = chunk_ranges(requests.len(), limit);
        debug!(
            requests = requests.len(),
            chunks = ranges.len(),
            limit = ?limit,
            "running batch"
        );

        if ranges.len() == 1 {
            return self.send_chunk(requests, &options.headers);
        }
        self.run_chunks(requests, &ranges, options)
    }

    fn run_chunks(
        &self,
        requests: &[RequestDescriptor],
        ranges: &[Range<usize>],
        options: &ResolvedOptions,
    ) -> ClientResult<Vec<ResponseEnvelope>> {
        let mut responses = Vec::with_capacity(requests.len());
        let mut applied = 0usize;

        for (wave_index, wave) in ranges.chunks(options.concurrency).enumerate() {
            let first_chunk = wave_index * options.concurrency;
            let results = self.run_wave(requests, wave, &options.headers);

            let mut failure = None;
            for (offset, (range, result)) in wave.iter().zip(results).enumerate() {
                match result {
                    Ok(chunk) => {
                        applied += range.len();
                        if failure.is_none() {
                            responses.extend(chunk);
                        }
                    }
                    Err(err) if failure.is_none() => failure = Some((first_chunk + offset, err)),
                    Err(err) => warn!(error = %err, "sibling batch chunk also failed"),
                }
            }

            if let Some((failed_chunk, source)) = failure {
                warn!(
                    failed_chunk,
                    total_chunks = ranges.len(),
                    applied_requests = applied,
                    "batch chunk failed"
                );
                return Err(ClientError::PartialBatch {
                    failed_chunk,
                    total_chunks: ranges.len(),
                    applied_requests: applied,
                    source: Box::new(source),
                });
            }
        }

        Ok(responses)
    }

    /// Sends every chunk of a wave, in parallel when the wave has more than
    /// one chunk, and returns the results in chunk order.
    fn run_wave(
        &self,
        requests: &[RequestDescriptor],
        wave: &[Range<usize>],
        headers: &Headers,
    ) -> Vec<ClientResult<Vec<ResponseEnvelope>>> {
        if wave.len() == 1 {
            return wave
                .iter()
                .map(|range| self.send_chunk(&requests[range.clone()], headers))
                .collect();
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = wave
                .iter()
                .map(|range| {
                    let chunk = &requests[range.clone()];
                    scope.spawn(move || self.send_chunk(chunk, headers))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }

    /// Sends one physical batch request.
    fn send_chunk(
        &self,
        chunk: &[RequestDescriptor],
        headers: &Headers,
    ) -> ClientResult<Vec<ResponseEnvelope>> {
        let body = BatchRequest::new(headers.clone(), chunk.to_vec()).to_value()?;
        let mut request = RequestDescriptor::post(batch_path(), body);
        request.headers = headers.clone();

        let envelope = self.executor.execute(&request)?;
        let response = BatchResponse::from_body(envelope.body.as_ref())?;
        Ok(response.responses)
    }
}
