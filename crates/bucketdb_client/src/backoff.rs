//! Server-signaled backoff tracking.
//!
//! The server may answer any request with a `Backoff` header asking
//! clients to stay away for a while. Executors publish those directives
//! through a [`BackoffNotifier`]; a [`BackoffTracker`] subscribes to it and
//! answers "how long until I may send again". Nothing here delays or
//! blocks a request: enforcement is the caller's job.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Receives backoff directives from an executor.
pub trait BackoffListener: Send + Sync {
    /// Called when a response carried a backoff directive.
    fn backoff_observed(&self, duration_ms: u64);
}

/// Fan-out of backoff directives to registered listeners.
#[derive(Default)]
pub struct BackoffNotifier {
    listeners: RwLock<Vec<Arc<dyn BackoffListener>>>,
}

impl BackoffNotifier {
    /// Creates a notifier with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn subscribe(&self, listener: Arc<dyn BackoffListener>) {
        self.listeners.write().push(listener);
    }

    /// Delivers a directive to every listener.
    ///
    /// Listeners run outside the lock and may subscribe further listeners,
    /// which see the next directive.
    pub fn notify(&self, duration_ms: u64) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.backoff_observed(duration_ms);
        }
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl std::fmt::Debug for BackoffNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Remembers until when the server asked clients to back off.
#[derive(Debug, Default)]
pub struct BackoffTracker {
    release_at: Mutex<Option<Instant>>,
}

impl BackoffTracker {
    /// Creates a tracker with no active directive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a directive received now.
    pub fn observe(&self, duration_ms: u64) {
        self.observe_at(duration_ms, Instant::now());
    }

    /// Records a directive received at `now`.
    ///
    /// A zero duration clears any active directive.
    pub fn observe_at(&self, duration_ms: u64, now: Instant) {
        let release = (duration_ms > 0).then(|| now + Duration::from_millis(duration_ms));
        *self.release_at.lock() = release;
    }

    /// Milliseconds left before requests may resume; zero when none.
    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms_at(Instant::now())
    }

    /// Milliseconds left at `now`.
    pub fn remaining_ms_at(&self, now: Instant) -> u64 {
        match *self.release_at.lock() {
            Some(release) => {
                let remaining = release.saturating_duration_since(now);
                // Round up so a directive never reads as elapsed early.
                let millis = remaining.as_millis();
                let rounded = if remaining.subsec_nanos() % 1_000_000 == 0 {
                    millis
                } else {
                    millis + 1
                };
                u64::try_from(rounded).unwrap_or(u64::MAX)
            }
            None => 0,
        }
    }

    /// Returns true while a directive is active.
    pub fn is_active(&self) -> bool {
        self.remaining_ms() > 0
    }
}

impl BackoffListener for BackoffTracker {
    fn backoff_observed(&self, duration_ms: u64) {
        tracing::debug!(duration_ms, "server requested backoff");
        self.observe(duration_ms);
    }
}
