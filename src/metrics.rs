//! Metrics Aggregator Module
//!
//! Tracks cache performance and mode transitions with lock-free counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

// == Metrics Snapshot ==
/// Point-in-time view of the counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of lookups with no entry
    pub misses: u64,
    /// Number of entries removed by capacity eviction
    pub evictions: u64,
    /// Current number of entries in the store (0 for the shared backend)
    pub size: usize,
    /// hits / (hits + misses), 0.0 before any lookup
    pub hit_rate: f64,
    /// Number of NORMAL/DEGRADED transitions
    pub mode_transitions: u64,
    /// When any counter last moved
    pub last_updated_at: DateTime<Utc>,
}

// == Metrics Aggregator ==
/// Counters shared by the cache store and the mode coordinator.
#[derive(Debug)]
pub struct MetricsAggregator {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    transitions: AtomicU64,
    last_updated_ms: AtomicI64,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    // == Constructor ==
    /// Creates a new aggregator with all counters at zero.
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            transitions: AtomicU64::new(0),
            last_updated_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    /// Adds one eviction batch worth of removed entries.
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    // == Snapshot ==
    /// Returns a copy of the counters with the hit rate recomputed.
    ///
    /// The entry count is owned by the store, which reads it under its own
    /// lock and passes it in.
    pub fn snapshot(&self, size: usize) -> Metrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        let last_updated_at = Utc
            .timestamp_millis_opt(self.last_updated_ms.load(Ordering::Relaxed))
            .single()
            .unwrap_or_else(Utc::now);

        Metrics {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            size,
            hit_rate,
            mode_transitions: self.transitions.load(Ordering::Relaxed),
            last_updated_at,
        }
    }

    // == Reset ==
    /// Zeroes every counter. Only called when the store is cleared.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.transitions.store(0, Ordering::Relaxed);
        self.touch();
    }

    fn touch(&self) {
        self.last_updated_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }
}
