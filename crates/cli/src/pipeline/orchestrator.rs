//! Pipeline orchestrator - wires mock channel sources, their queues and the
//! synchronizer together.

use std::future::Future;
use std::time::{Duration, Instant};

use contracts::PipelineBlueprint;
use ingestion::{
    DriverEvent, MockChannelSource, QueueConfig, RunLimits, StopReason, SyncDriver, channel_queue,
};
use observability::BundleMetricsAggregator;
use sync_engine::FrameSynchronizer;
use tracing::{info, warn};

use super::{ChannelQueueStats, PipelineStats};
use crate::error::Result;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: PipelineBlueprint,

    /// Stop after this many bundles (None = unlimited)
    pub max_bundles: Option<u64>,

    /// Stop after this long (None = no timeout)
    pub timeout: Option<Duration>,

    /// Cap on sequence numbers each mock source produces (None = unlimited)
    pub max_sequences: Option<u64>,
}

impl PipelineConfig {
    pub fn new(blueprint: PipelineBlueprint) -> Self {
        Self {
            blueprint,
            max_bundles: None,
            timeout: None,
            max_sequences: None,
        }
    }
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until a limit is hit, every source finishes, or `shutdown` resolves
    pub async fn run<S>(self, shutdown: S) -> Result<PipelineStats>
    where
        S: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        let sync_config = blueprint.to_sync_config();
        let synchronizer = FrameSynchronizer::new(sync_config.clone())?;
        info!(
            required = ?sync_config.required_channels,
            max_depth = ?sync_config.buffer.max_depth,
            "Frame synchronizer configured"
        );

        // One queue and one mock source per declared channel
        let mut driver = SyncDriver::new(synchronizer);
        let mut sources = Vec::with_capacity(blueprint.channels.len());
        let mut queue_metrics = Vec::with_capacity(blueprint.channels.len());

        for channel in &blueprint.channels {
            let (tx, rx) = channel_queue(channel.id.clone(), QueueConfig::from(channel));
            queue_metrics.push((channel.id.clone(), rx.metrics()));
            driver.add_receiver(rx)?;

            let mut source = MockChannelSource::from_channel(channel);
            if let Some(max) = self.config.max_sequences {
                source = source.with_max_sequences(max);
            }
            source.start(tx)?;
            sources.push(source);
        }

        info!(
            device = %blueprint.device.name,
            channels = sources.len(),
            "Mock channel sources started"
        );

        let limits = RunLimits {
            max_bundles: self.config.max_bundles,
            timeout: self.config.timeout,
            ..Default::default()
        };

        let mut aggregator = BundleMetricsAggregator::new();
        let interrupted = {
            let run = driver.run(limits, |event, sync| match event {
                DriverEvent::Bundle(bundle) => {
                    let buffered = sync.total_buffered();
                    observability::record_bundle_metrics(&bundle, buffered);
                    observability::record_sync_counters(&sync.counters());
                    for (channel, depth) in &sync.buffer_stats().depths {
                        observability::record_buffer_depth(channel, *depth);
                    }
                    aggregator.update(bundle.sequence, &sync.counters(), buffered);

                    info!(
                        sequence = bundle.sequence,
                        channels = bundle.len(),
                        bytes = bundle.frames.values().map(|f| f.payload.byte_len()).sum::<usize>(),
                        buffered,
                        "Bundle complete"
                    );
                }
                DriverEvent::Stalled(report) => {
                    observability::record_stall(&report);
                    aggregator.record_stall(&report);
                }
            });

            tokio::select! {
                _ = run => false,
                _ = shutdown => true,
            }
        };

        if interrupted {
            warn!("Received shutdown signal, stopping pipeline...");
        }

        info!("Stopping channel sources...");
        for source in &sources {
            source.stop();
        }

        let driver_stats = driver.stats().clone();
        let synchronizer = driver.synchronizer();

        let stats = PipelineStats {
            bundles: driver_stats.bundles_emitted,
            frames_received: driver_stats.frames_received,
            active_channels: sources.len(),
            stop_reason: if interrupted {
                None
            } else {
                driver_stats.stop_reason
            },
            counters: synchronizer.counters(),
            buffered_at_exit: synchronizer.total_buffered(),
            queues: queue_metrics
                .iter()
                .map(|(channel, metrics)| ChannelQueueStats {
                    channel: channel.clone(),
                    snapshot: metrics.snapshot(),
                })
                .collect(),
            bundle_metrics: aggregator,
            duration: start_time.elapsed(),
        };

        if stats.stop_reason == Some(StopReason::Timeout) {
            warn!(
                timeout_secs = self.config.timeout.map(|t| t.as_secs_f64()),
                "Pipeline timed out"
            );
        }

        info!(
            bundles = stats.bundles,
            duration_secs = stats.duration.as_secs_f64(),
            bundles_per_sec = format!("{:.2}", stats.bundles_per_sec()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}
