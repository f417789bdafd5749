//! Observer interface for request accounting.
//!
//! Components that talk to the backend take an `Arc<dyn ClientObserver>` at
//! construction time. There is no process-wide counter; callers that want
//! numbers pass a [`RequestCounters`] and read it back.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Receives notifications about backend traffic. Every method defaults to a no-op.
pub trait ClientObserver: Send + Sync {
    /// A directory listing request was issued.
    fn fetch_started(&self, _project: &str, _path: &str) {}

    /// A directory listing arrived with `children` entries.
    fn fetch_finished(&self, _project: &str, _path: &str, _children: usize) {}

    /// A directory listing request failed.
    fn fetch_failed(&self, _project: &str, _path: &str, _message: &str) {}

    /// An expansion waited on a listing already in flight instead of fetching.
    fn fetch_shared(&self, _project: &str, _path: &str) {}

    /// A response for a superseded source view was discarded.
    fn stale_response_dropped(&self, _generation: u64) {}

    /// A completion query was not sent because another one was outstanding.
    fn query_dropped(&self, _query: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ClientObserver for NoopObserver {}

/// Observer that counts events with atomics.
#[derive(Debug, Default)]
pub struct RequestCounters {
    fetches: AtomicUsize,
    fetch_failures: AtomicUsize,
    shared_fetches: AtomicUsize,
    stale_responses: AtomicUsize,
    dropped_queries: AtomicUsize,
}

/// Point-in-time copy of [`RequestCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub fetches: usize,
    pub fetch_failures: usize,
    pub shared_fetches: usize,
    pub stale_responses: usize,
    pub dropped_queries: usize,
}

impl RequestCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            shared_fetches: self.shared_fetches.load(Ordering::Relaxed),
            stale_responses: self.stale_responses.load(Ordering::Relaxed),
            dropped_queries: self.dropped_queries.load(Ordering::Relaxed),
        }
    }
}

impl ClientObserver for RequestCounters {
    fn fetch_started(&self, _project: &str, _path: &str) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    fn fetch_failed(&self, _project: &str, _path: &str, _message: &str) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn fetch_shared(&self, _project: &str, _path: &str) {
        self.shared_fetches.fetch_add(1, Ordering::Relaxed);
    }

    fn stale_response_dropped(&self, _generation: u64) {
        self.stale_responses.fetch_add(1, Ordering::Relaxed);
    }

    fn query_dropped(&self, _query: &str) {
        self.dropped_queries.fetch_add(1, Ordering::Relaxed);
    }
}
