//! Backpressure configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Drop policy when the downstream channel is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Drop the batch that failed to enqueue
    #[default]
    DropNewest,
    /// Evict the oldest queued batch to make room
    DropOldest,
}

/// Backpressure configuration
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    /// Channel capacity
    pub channel_capacity: usize,

    /// Drop policy when full
    pub drop_policy: DropPolicy,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
            drop_policy: DropPolicy::DropNewest,
        }
    }
}

impl BackpressureConfig {
    /// Create new backpressure configuration
    pub fn new(channel_capacity: usize, drop_policy: DropPolicy) -> Self {
        Self {
            channel_capacity,
            drop_policy,
        }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total packets decoded
    pub packets_decoded: AtomicU64,

    /// Total batches dropped by backpressure
    pub batches_dropped: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,

    /// Rejected packet count (type/size mismatch)
    pub packets_rejected: AtomicU64,

    /// Bytes skipped while resynchronizing on the stream
    pub bytes_skipped: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record packet decoded
    pub fn record_decoded(&self) {
        self.packets_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record batch dropped
    pub fn record_dropped(&self) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record rejected packet
    pub fn record_rejected(&self) {
        self.packets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record skipped resync bytes
    pub fn record_skipped(&self, n: u64) {
        self.bytes_skipped.fetch_add(n, Ordering::Relaxed);
    }

    /// Update queue length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
            packets_rejected: self.packets_rejected.load(Ordering::Relaxed),
            bytes_skipped: self.bytes_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub packets_decoded: u64,
    pub batches_dropped: u64,
    pub queue_len: usize,
    pub packets_rejected: u64,
    pub bytes_skipped: u64,
}
