use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Counters kept by every forwarding group.
#[derive(Default)]
pub struct ForwardMetrics {
    pub requests: AtomicU64,
    /// Queries sent to a random upstream because every upstream was down.
    pub healthcheck_broken: AtomicU64,
    pub max_concurrent_rejects: AtomicU64,
    pub upstream_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardMetricsSnapshot {
    pub requests: u64,
    pub healthcheck_broken: u64,
    pub max_concurrent_rejects: u64,
    pub upstream_errors: u64,
}

impl ForwardMetrics {
    pub fn snapshot(&self) -> ForwardMetricsSnapshot {
        ForwardMetricsSnapshot {
            requests: self.requests.load(AtomicOrdering::Relaxed),
            healthcheck_broken: self.healthcheck_broken.load(AtomicOrdering::Relaxed),
            max_concurrent_rejects: self.max_concurrent_rejects.load(AtomicOrdering::Relaxed),
            upstream_errors: self.upstream_errors.load(AtomicOrdering::Relaxed),
        }
    }

    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }
}
