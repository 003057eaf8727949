//! Bundle metrics
//!
//! Prometheus recording helpers plus an in-memory aggregator for run
//! summaries.

use std::collections::HashMap;
use std::fmt;

use contracts::{Bundle, StallReport, SyncCounters};
use metrics::{counter, gauge, histogram};

/// Record one emitted bundle
///
/// `buffered` is the number of frames still held by the synchronizer after
/// the bundle was taken out.
pub fn record_bundle_metrics<P>(bundle: &Bundle<P>, buffered: usize) {
    counter!("depth_sync_bundles_total").increment(1);
    gauge!("depth_sync_last_sequence").set(bundle.sequence as f64);
    histogram!("depth_sync_bundle_channels").record(bundle.len() as f64);
    histogram!("depth_sync_buffered_frames").record(buffered as f64);
}

pub fn record_buffer_depth(channel: &str, depth: usize) {
    gauge!(
        "depth_sync_buffer_depth",
        "channel" => channel.to_string()
    )
    .set(depth as f64);
}

/// Publish the synchronizer counters as gauges
pub fn record_sync_counters(counters: &SyncCounters) {
    gauge!("depth_sync_frames_buffered").set(counters.frames_buffered as f64);
    gauge!("depth_sync_frames_pruned").set(counters.frames_pruned as f64);
    gauge!("depth_sync_frames_evicted").set(counters.frames_evicted as f64);
    gauge!("depth_sync_frames_stale").set(counters.frames_stale as f64);
    gauge!("depth_sync_frames_unlisted").set(counters.frames_unlisted as f64);
}

pub fn record_stall(report: &StallReport) {
    counter!("depth_sync_stalls_total").increment(1);
    gauge!("depth_sync_channels_saturated").set(report.saturated.len() as f64);
    gauge!("depth_sync_channels_lagging").set(report.lagging.len() as f64);
    for channel in &report.lagging {
        counter!(
            "depth_sync_channel_lagging_total",
            "channel" => channel.to_string()
        )
        .increment(1);
    }
}

/// Bundle metrics aggregator
///
/// Aggregates in memory for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct BundleMetricsAggregator {
    pub total_bundles: u64,

    pub first_sequence: Option<u64>,

    pub last_sequence: Option<u64>,

    /// Sequence numbers between consecutive bundles that produced none
    pub skipped_sequences: u64,

    pub stall_events: u64,

    /// Distance between consecutive bundle sequences
    pub gap_stats: RunningStats,

    /// Frames pruned by each bundle
    pub pruned_stats: RunningStats,

    /// Frames left buffered after each bundle
    pub buffered_stats: RunningStats,

    /// How often each channel was reported lagging
    pub lagging_counts: HashMap<String, u64>,

    pruned_seen: u64,
}

impl BundleMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one bundle
    ///
    /// `counters` is read right after the bundle was emitted; pruning is
    /// attributed to the bundle by differencing against the previous call.
    pub fn update(&mut self, sequence: u64, counters: &SyncCounters, buffered: usize) {
        self.total_bundles += 1;
        self.first_sequence.get_or_insert(sequence);

        if let Some(last) = self.last_sequence {
            let gap = sequence.saturating_sub(last);
            self.gap_stats.push(gap as f64);
            self.skipped_sequences += gap.saturating_sub(1);
        }
        self.last_sequence = Some(sequence);

        let pruned = counters.frames_pruned.saturating_sub(self.pruned_seen);
        self.pruned_seen = counters.frames_pruned;
        self.pruned_stats.push(pruned as f64);
        self.buffered_stats.push(buffered as f64);
    }

    pub fn record_stall(&mut self, report: &StallReport) {
        self.stall_events += 1;
        for channel in &report.lagging {
            *self.lagging_counts.entry(channel.to_string()).or_insert(0) += 1;
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let span = match (self.first_sequence, self.last_sequence) {
            (Some(first), Some(last)) => last - first + 1,
            _ => 0,
        };
        MetricsSummary {
            total_bundles: self.total_bundles,
            first_sequence: self.first_sequence,
            last_sequence: self.last_sequence,
            skipped_sequences: self.skipped_sequences,
            completion_rate: if span > 0 {
                self.total_bundles as f64 / span as f64 * 100.0
            } else {
                0.0
            },
            stall_events: self.stall_events,
            sequence_gap: StatsSummary::from(&self.gap_stats),
            pruned_per_bundle: StatsSummary::from(&self.pruned_stats),
            buffered_frames: StatsSummary::from(&self.buffered_stats),
            lagging_counts: self.lagging_counts.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_bundles: u64,
    pub first_sequence: Option<u64>,
    pub last_sequence: Option<u64>,
    pub skipped_sequences: u64,
    /// Bundles per sequence number in the covered range, in percent
    pub completion_rate: f64,
    pub stall_events: u64,
    pub sequence_gap: StatsSummary,
    pub pruned_per_bundle: StatsSummary,
    pub buffered_frames: StatsSummary,
    pub lagging_counts: HashMap<String, u64>,
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Bundle Metrics Summary ===")?;
        writeln!(f, "Total bundles: {}", self.total_bundles)?;
        if let (Some(first), Some(last)) = (self.first_sequence, self.last_sequence) {
            writeln!(f, "Sequence range: {first}..={last}")?;
        }
        writeln!(
            f,
            "Skipped sequences: {} (completion {:.2}%)",
            self.skipped_sequences, self.completion_rate
        )?;
        writeln!(f, "Sequence gap: {}", self.sequence_gap)?;
        writeln!(f, "Pruned per bundle: {}", self.pruned_per_bundle)?;
        writeln!(f, "Buffered frames: {}", self.buffered_frames)?;
        writeln!(f, "Stall events: {}", self.stall_events)?;

        if !self.lagging_counts.is_empty() {
            writeln!(f, "Lagging channel counts:")?;
            let mut counts: Vec<_> = self.lagging_counts.iter().collect();
            counts.sort();
            for (channel, count) in counts {
                writeln!(f, "  {channel}: {count}")?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
