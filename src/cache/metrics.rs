//! Cache Metrics Collection
//!
//! Counters describing how the update protocol has treated the event stream.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    // Event routing
    events_routed: AtomicU64,
    events_dropped: AtomicU64,
    events_ignored: AtomicU64,

    // Bulk work
    bulk_loads: AtomicU64,
    bulk_entities: AtomicU64,

    // Invalidation
    shard_invalidations: AtomicU64,
    partitions_dropped: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_routed(&self) {
        self.events_routed.fetch_add(1, Ordering::Relaxed);
    }

    /// An event was understood but could not be applied
    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// An event type the cache does not handle
    pub fn record_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bulk_load(&self, entities: u64) {
        self.bulk_loads.fetch_add(1, Ordering::Relaxed);
        self.bulk_entities.fetch_add(entities, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self, partitions: u64) {
        self.shard_invalidations.fetch_add(1, Ordering::Relaxed);
        self.partitions_dropped.fetch_add(partitions, Ordering::Relaxed);
    }

    pub fn events_routed(&self) -> u64 {
        self.events_routed.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    /// Share of routed events that were dropped
    pub fn drop_ratio(&self) -> f64 {
        let routed = self.events_routed() as f64;
        if routed == 0.0 {
            0.0
        } else {
            self.events_dropped() as f64 / routed
        }
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_routed: self.events_routed(),
            events_dropped: self.events_dropped(),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            drop_ratio: self.drop_ratio(),
            bulk_loads: self.bulk_loads.load(Ordering::Relaxed),
            bulk_entities: self.bulk_entities.load(Ordering::Relaxed),
            shard_invalidations: self.shard_invalidations.load(Ordering::Relaxed),
            partitions_dropped: self.partitions_dropped.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.events_routed.store(0, Ordering::Relaxed);
        self.events_dropped.store(0, Ordering::Relaxed);
        self.events_ignored.store(0, Ordering::Relaxed);
        self.bulk_loads.store(0, Ordering::Relaxed);
        self.bulk_entities.store(0, Ordering::Relaxed);
        self.shard_invalidations.store(0, Ordering::Relaxed);
        self.partitions_dropped.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of all cache metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub events_routed: u64,
    pub events_dropped: u64,
    pub events_ignored: u64,
    pub drop_ratio: f64,
    pub bulk_loads: u64,
    pub bulk_entities: u64,
    pub shard_invalidations: u64,
    pub partitions_dropped: u64,
}

// =============================================================================
// Tests
// =============================================================================
