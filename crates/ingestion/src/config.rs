//! Queue configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::ChannelConfig;
pub use contracts::DropPolicy;

/// Host-side queue configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Queue capacity
    pub capacity: usize,

    /// What a full queue discards
    pub drop_policy: DropPolicy,
}

impl Default for QueueConfig {
    /// A single slot that always holds the latest frame
    fn default() -> Self {
        Self {
            capacity: 1,
            drop_policy: DropPolicy::DropOldest,
        }
    }
}

impl QueueConfig {
    pub fn new(capacity: usize, drop_policy: DropPolicy) -> Self {
        Self {
            capacity,
            drop_policy,
        }
    }
}

impl From<&ChannelConfig> for QueueConfig {
    fn from(channel: &ChannelConfig) -> Self {
        Self::new(channel.queue_capacity, channel.queue_policy)
    }
}

/// Per-queue counters, shared between producer and consumer
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Frames offered by the producer
    pub frames_offered: AtomicU64,

    /// Frames handed to the consumer
    pub frames_received: AtomicU64,

    /// Frames discarded because the queue was full
    pub frames_dropped: AtomicU64,

    /// Queue length observed at the last receive
    pub queue_len: AtomicUsize,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_offered(&self) {
        self.frames_offered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_offered: self.frames_offered.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_offered: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub queue_len: usize,
}
