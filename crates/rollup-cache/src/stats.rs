// crates/rollup-cache/src/stats.rs
// ============================================================================
// Module: Cache Statistics
// Description: spec.md §4.H "Statistics".
// Purpose: Running hit/miss counters and latency averages exposed for
//          operator dashboards.
// Dependencies: std::sync::atomic
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// A point-in-time snapshot of [`CacheStats`] (`spec.md` §4.H).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStatsSnapshot {
    /// L1 hits.
    pub l1_hits: u64,
    /// L1 misses.
    pub l1_misses: u64,
    /// L2 hits.
    pub l2_hits: u64,
    /// L2 misses.
    pub l2_misses: u64,
    /// Overall hit ratio across both layers, in `[0.0, 1.0]`.
    pub hit_ratio: f64,
    /// Average `Get` latency in milliseconds.
    pub avg_get_latency_ms: f64,
    /// Average `Set` latency in milliseconds.
    pub avg_set_latency_ms: f64,
}

/// Thread-safe running statistics for a [`crate::cache::RollupCache`]
/// (`spec.md` §4.H).
#[derive(Debug, Default)]
pub struct CacheStats {
    /// L1 hits.
    l1_hits: AtomicU64,
    /// L1 misses.
    l1_misses: AtomicU64,
    /// L2 hits.
    l2_hits: AtomicU64,
    /// L2 misses.
    l2_misses: AtomicU64,
    /// Sum of `Get` latencies in microseconds.
    get_latency_total_micros: AtomicU64,
    /// Number of `Get` calls recorded.
    get_count: AtomicU64,
    /// Sum of `Set` latencies in microseconds.
    set_latency_total_micros: AtomicU64,
    /// Number of `Set` calls recorded.
    set_count: AtomicU64,
}

impl CacheStats {
    /// Creates a zeroed statistics tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an L1 hit or miss.
    pub fn record_l1(&self, hit: bool) {
        if hit { self.l1_hits.fetch_add(1, Ordering::Relaxed) } else { self.l1_misses.fetch_add(1, Ordering::Relaxed) };
    }

    /// Records an L2 hit or miss.
    pub fn record_l2(&self, hit: bool) {
        if hit { self.l2_hits.fetch_add(1, Ordering::Relaxed) } else { self.l2_misses.fetch_add(1, Ordering::Relaxed) };
    }

    /// Records the latency of a single `Get` call.
    pub fn record_get_latency(&self, micros: u64) {
        self.get_latency_total_micros.fetch_add(micros, Ordering::Relaxed);
        self.get_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the latency of a single `Set` call.
    pub fn record_set_latency(&self, micros: u64) {
        self.set_latency_total_micros.fetch_add(micros, Ordering::Relaxed);
        self.set_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a consistent snapshot of the current counters.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        reason = "counters are hit/miss and microsecond totals, far below f64's exact integer range in practice"
    )]
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let l1_hits = self.l1_hits.load(Ordering::Relaxed);
        let l1_misses = self.l1_misses.load(Ordering::Relaxed);
        let l2_hits = self.l2_hits.load(Ordering::Relaxed);
        let l2_misses = self.l2_misses.load(Ordering::Relaxed);
        let total = l1_hits + l1_misses + l2_hits + l2_misses;
        let hits = l1_hits + l2_hits;
        let hit_ratio = if total == 0 { 0.0 } else { hits as f64 / total as f64 };

        let get_count = self.get_count.load(Ordering::Relaxed);
        let avg_get_latency_ms = if get_count == 0 {
            0.0
        } else {
            self.get_latency_total_micros.load(Ordering::Relaxed) as f64 / get_count as f64 / 1000.0
        };
        let set_count = self.set_count.load(Ordering::Relaxed);
        let avg_set_latency_ms = if set_count == 0 {
            0.0
        } else {
            self.set_latency_total_micros.load(Ordering::Relaxed) as f64 / set_count as f64 / 1000.0
        };

        CacheStatsSnapshot {
            l1_hits,
            l1_misses,
            l2_hits,
            l2_misses,
            hit_ratio,
            avg_get_latency_ms,
            avg_set_latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_ratio_is_zero_with_no_activity() {
        let stats = CacheStats::new();
        assert_eq!(stats.snapshot().hit_ratio, 0.0);
    }

    #[test]
    fn hit_ratio_reflects_recorded_hits_and_misses() {
        let stats = CacheStats::new();
        stats.record_l1(true);
        stats.record_l1(false);
        stats.record_l2(true);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.l1_hits, 1);
        assert_eq!(snapshot.l1_misses, 1);
        assert_eq!(snapshot.l2_hits, 1);
        assert!((snapshot.hit_ratio - (2.0 / 3.0)).abs() < 1e-9);
    }
}
