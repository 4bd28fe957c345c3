//! Cache counters.
//!
//! Counters are plain relaxed atomics; a [`CacheStats`] snapshot is not a
//! consistent cut across all of them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of a cache's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently stored, stale ones included.
    pub size: usize,
    /// Fetches currently outstanding.
    pub in_flight: usize,
    /// Reads answered from a fresh entry.
    pub hits: u64,
    /// Reads that found no fresh entry.
    pub misses: u64,
    /// Fetches started.
    pub fetches: u64,
    /// Callers that joined a fetch someone else started.
    pub coalesced: u64,
    /// Fetches that failed with the fetch function's own error.
    pub failures: u64,
    /// Fetches that hit the deadline.
    pub timeouts: u64,
    /// Entries removed by invalidate or clear.
    pub invalidations: u64,
}

impl CacheStats {
    /// Hits over all freshness checks. Forced refreshes are not counted.
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Hits plus misses.
    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

#[derive(Debug, Default)]
pub(crate) struct MetricsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    invalidations: AtomicU64,
}

impl MetricsCollector {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidations(&self, count: usize) {
        self.invalidations.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, size: usize, in_flight: usize) -> CacheStats {
        CacheStats {
            size,
            in_flight,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_handles_zero_lookups() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn snapshot_reflects_records() {
        let metrics = MetricsCollector::default();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_fetch();
        metrics.record_invalidations(4);

        let stats = metrics.snapshot(2, 1);
        assert_eq!(stats.size, 2);
        assert_eq!(stats.in_flight, 1);
        assert_eq!(stats.total_lookups(), 4);
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.invalidations, 4);
    }
}
