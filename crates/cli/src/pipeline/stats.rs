//! Pipeline statistics.

use std::time::Duration;

use contracts::{ChannelId, SyncCounters};
use ingestion::{MetricsSnapshot, StopReason};
use observability::BundleMetricsAggregator;

/// Host-side queue counters for one channel
#[derive(Debug, Clone)]
pub struct ChannelQueueStats {
    pub channel: ChannelId,
    pub snapshot: MetricsSnapshot,
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Bundles emitted by the synchronizer
    pub bundles: u64,

    /// Frames taken off the channel queues
    pub frames_received: u64,

    pub active_channels: usize,

    /// `None` when the run was interrupted
    pub stop_reason: Option<StopReason>,

    pub counters: SyncCounters,

    /// Frames still held by the synchronizer when the run ended
    pub buffered_at_exit: usize,

    pub queues: Vec<ChannelQueueStats>,

    pub bundle_metrics: BundleMetricsAggregator,

    pub duration: Duration,
}

impl PipelineStats {
    pub fn bundles_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.bundles as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Frames dropped by full queues across all channels
    pub fn queue_drops(&self) -> u64 {
        self.queues.iter().map(|q| q.snapshot.frames_dropped).sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        let stop = match self.stop_reason {
            Some(StopReason::MaxBundles) => "bundle limit reached",
            Some(StopReason::Timeout) => "timeout",
            Some(StopReason::AllClosed) => "all channels closed",
            None => "interrupted",
        };

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s ({stop})", self.duration.as_secs_f64());
        println!("   ├─ Bundles: {}", self.bundles);
        println!("   ├─ Bundles/s: {:.2}", self.bundles_per_sec());
        println!("   ├─ Frames received: {}", self.frames_received);
        println!("   └─ Active channels: {}", self.active_channels);

        println!("\n📈 Synchronizer");
        println!("   ├─ Frames buffered: {}", self.counters.frames_buffered);
        println!("   ├─ Frames pruned: {}", self.counters.frames_pruned);
        println!("   ├─ Frames evicted (cap): {}", self.counters.frames_evicted);
        println!("   ├─ Stale arrivals: {}", self.counters.frames_stale);
        println!("   ├─ Unlisted discarded: {}", self.counters.frames_unlisted);
        println!("   └─ Buffered at exit: {}", self.buffered_at_exit);

        let summary = self.bundle_metrics.summary();
        println!("\n🔗 Bundles");
        println!(
            "   ├─ Skipped sequences: {} (completion {:.2}%)",
            summary.skipped_sequences, summary.completion_rate
        );
        println!("   ├─ Sequence gap: {}", summary.sequence_gap);
        println!("   ├─ Pruned per bundle: {}", summary.pruned_per_bundle);
        println!("   ├─ Buffered frames: {}", summary.buffered_frames);
        println!("   └─ Stall events: {}", summary.stall_events);

        if !self.queues.is_empty() {
            println!("\n📥 Channel Queues (dropped {} total)", self.queue_drops());
            for (i, queue) in self.queues.iter().enumerate() {
                let prefix = if i == self.queues.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: offered {}, received {}, dropped {}",
                    prefix,
                    queue.channel,
                    queue.snapshot.frames_offered,
                    queue.snapshot.frames_received,
                    queue.snapshot.frames_dropped
                );
            }
        }

        if !summary.lagging_counts.is_empty() {
            println!("\n⚠️  Lagging Channels");
            let mut counts: Vec<_> = summary.lagging_counts.iter().collect();
            counts.sort();
            for (channel, count) in counts {
                println!("   ├─ {}: {}", channel, count);
            }
        }

        println!();
    }
}
