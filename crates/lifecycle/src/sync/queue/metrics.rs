use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters describing one queue's activity
#[derive(Debug, Default)]
pub struct QueueMetrics {
    pub total_enqueued: AtomicU64,
    pub total_completed: AtomicU64,
    pub total_failed: AtomicU64,
    pub total_panicked: AtomicU64,
    pub capacity_rejections: AtomicU64,
    pub current_depth: AtomicUsize,
    pub queue_depth_max: AtomicUsize,
    pub processing_time_total_us: AtomicU64,
}

impl QueueMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted item and the pending depth after it was appended
    pub fn record_enqueue(&self, depth: usize) {
        self.total_enqueued.fetch_add(1, AtomicOrdering::Relaxed);
        self.update_depth(depth);
    }

    /// Record a processed item
    pub fn record_outcome(&self, succeeded: bool, elapsed: Duration) {
        if succeeded {
            self.total_completed.fetch_add(1, AtomicOrdering::Relaxed);
        } else {
            self.total_failed.fetch_add(1, AtomicOrdering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.processing_time_total_us.fetch_add(micros, AtomicOrdering::Relaxed);
    }

    /// Record a processor panic (also counted as a failure)
    pub fn record_panic(&self, elapsed: Duration) {
        self.total_panicked.fetch_add(1, AtomicOrdering::Relaxed);
        self.record_outcome(false, elapsed);
    }

    /// Record capacity rejection
    pub fn record_capacity_rejection(&self) {
        self.capacity_rejections.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Update the number of items waiting behind the in-flight one
    pub fn update_depth(&self, depth: usize) {
        self.current_depth.store(depth, AtomicOrdering::Relaxed);
        self.queue_depth_max.fetch_max(depth, AtomicOrdering::Relaxed);
    }

    /// Get a snapshot of metrics
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        let total_completed = self.total_completed.load(AtomicOrdering::Relaxed);
        let total_failed = self.total_failed.load(AtomicOrdering::Relaxed);
        let processing_time_total_us = self.processing_time_total_us.load(AtomicOrdering::Relaxed);

        QueueMetricsSnapshot {
            total_enqueued: self.total_enqueued.load(AtomicOrdering::Relaxed),
            total_completed,
            total_failed,
            total_panicked: self.total_panicked.load(AtomicOrdering::Relaxed),
            capacity_rejections: self.capacity_rejections.load(AtomicOrdering::Relaxed),
            current_depth: self.current_depth.load(AtomicOrdering::Relaxed),
            queue_depth_max: self.queue_depth_max.load(AtomicOrdering::Relaxed),
            processing_time_total_us,
            average_processing_time_us: average(
                processing_time_total_us,
                total_completed + total_failed,
            ),
        }
    }
}

fn average(total: u64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total as f64 / count as f64
}

/// Immutable metrics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMetricsSnapshot {
    pub total_enqueued: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_panicked: u64,
    pub capacity_rejections: u64,
    pub current_depth: usize,
    pub queue_depth_max: usize,
    pub processing_time_total_us: u64,
    pub average_processing_time_us: f64,
}

impl QueueMetricsSnapshot {
    /// Items that finished processing, successfully or not
    pub fn total_processed(&self) -> u64 {
        self.total_completed + self.total_failed
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Queue Metrics:\n\
            - Pending: {} (max {})\n\
            - Total Enqueued: {}\n\
            - Total Processed: {} (failed: {}, panicked: {})\n\
            - Capacity Rejections: {}\n\
            - Average Processing Time: {:.1}us",
            self.current_depth,
            self.queue_depth_max,
            self.total_enqueued,
            self.total_processed(),
            self.total_failed,
            self.total_panicked,
            self.capacity_rejections,
            self.average_processing_time_us
        )
    }
}
