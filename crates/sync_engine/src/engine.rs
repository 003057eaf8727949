//! Frame synchronizer implementation.

use std::collections::{HashMap, HashSet};

use contracts::{
    ArrivalPolicy, BufferStats, Bundle, ChannelId, Frame, FramePayload, StallReport, SyncConfig,
    SyncCounters, SyncError, UnlistedChannelPolicy,
};
use tracing::instrument;

use crate::buffer::{ChannelBuffer, PushOutcome};

/// Multi-stream frame synchronizer
///
/// Buffers frames per channel and emits a [`Bundle`] as soon as every
/// required channel holds a frame carrying the sequence number that just
/// arrived. Purely reactive: no threads, no waiting. Callers that poll
/// channels from several threads must serialize access (it takes `&mut self`).
#[derive(Debug)]
pub struct FrameSynchronizer<P = FramePayload> {
    config: SyncConfig,
    /// Required channels in configuration order
    required: Vec<ChannelId>,
    required_set: HashSet<ChannelId>,
    /// Created lazily on first arrival
    buffers: HashMap<ChannelId, ChannelBuffer<P>>,
    counters: SyncCounters,
    /// Sequence of the last emitted bundle
    last_emitted: Option<u64>,
}

impl<P> FrameSynchronizer<P> {
    /// Create a synchronizer
    ///
    /// # Errors
    /// `SyncError::ConfigValidation` when the required set is empty, names a
    /// channel twice or contains an empty name, or when the depth cap is zero.
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        validate_config(&config)?;

        let required = config.required_channels.clone();
        let required_set = required.iter().cloned().collect();

        tracing::debug!(
            required = ?required,
            max_depth = ?config.buffer.max_depth,
            unlisted = ?config.unlisted_channels,
            "frame synchronizer created"
        );

        Ok(Self {
            config,
            required,
            required_set,
            buffers: HashMap::new(),
            counters: SyncCounters::default(),
            last_emitted: None,
        })
    }

    /// Add a newly arrived frame
    ///
    /// Returns the completed bundle for `sequence` if every required channel
    /// now holds a frame with that sequence, `None` otherwise.
    pub fn add_frame(
        &mut self,
        channel: impl Into<ChannelId>,
        sequence: u64,
        payload: P,
    ) -> Option<Bundle<P>> {
        self.push(Frame::new(channel, sequence, payload))
    }

    /// Same as [`add_frame`](Self::add_frame) for a prebuilt frame
    #[instrument(
        level = "trace",
        name = "frame_sync_push",
        skip(self, frame),
        fields(channel = %frame.channel, sequence = frame.sequence)
    )]
    pub fn push(&mut self, frame: Frame<P>) -> Option<Bundle<P>> {
        let sequence = frame.sequence;

        if !self.admit(&frame) {
            return None;
        }
        if !self.store(frame) {
            return None;
        }

        self.try_match(sequence)
    }

    /// Apply the opt-in arrival filters (unlisted channels, stale sequences)
    fn admit(&mut self, frame: &Frame<P>) -> bool {
        if self.config.unlisted_channels == UnlistedChannelPolicy::Discard
            && !self.required_set.contains(&frame.channel)
        {
            self.counters.frames_unlisted += 1;
            tracing::trace!(channel = %frame.channel, "unlisted channel frame discarded");
            return false;
        }

        if self.config.arrival == ArrivalPolicy::DiscardStale {
            if let Some(last) = self.last_emitted.filter(|&last| frame.sequence < last) {
                self.counters.frames_stale += 1;
                tracing::debug!(
                    channel = %frame.channel,
                    sequence = frame.sequence,
                    last_emitted = last,
                    "stale frame discarded"
                );
                metrics::counter!(
                    "sync_frames_stale_total",
                    "channel" => frame.channel.to_string()
                )
                .increment(1);
                return false;
            }
        }

        true
    }

    /// Append to the channel buffer. Returns false if the frame was rejected.
    fn store(&mut self, frame: Frame<P>) -> bool {
        let max_depth = self.config.buffer.max_depth;
        let overflow = self.config.buffer.overflow;
        let channel = frame.channel.clone();

        let buffer = self
            .buffers
            .entry(channel.clone())
            .or_insert_with(|| ChannelBuffer::new(max_depth));
        let was_saturated = buffer.is_saturated();

        let (stored, evicted) = match buffer.push(frame, overflow) {
            PushOutcome::Stored => (true, false),
            PushOutcome::StoredEvicting(_) => (true, true),
            PushOutcome::Rejected(_) => (false, true),
        };

        if evicted {
            self.counters.frames_evicted += 1;
            metrics::counter!("sync_frames_evicted_total", "channel" => channel.to_string())
                .increment(1);
            if !was_saturated {
                tracing::warn!(
                    channel = %channel,
                    depth = buffer.len(),
                    policy = ?overflow,
                    "channel buffer saturated, a required stream may have stalled"
                );
            }
        }

        if stored {
            self.counters.frames_buffered += 1;
        }
        stored
    }

    #[instrument(level = "trace", name = "frame_sync_try_match", skip(self))]
    fn try_match(&mut self, sequence: u64) -> Option<Bundle<P>> {
        let complete = self.required.iter().all(|id| {
            self.buffers
                .get(id)
                .map(|buffer| buffer.contains_sequence(sequence))
                .unwrap_or(false)
        });

        if !complete {
            return None;
        }

        Some(self.emit(sequence))
    }

    /// Move the matching frames into a bundle and prune everything older
    fn emit(&mut self, sequence: u64) -> Bundle<P> {
        let mut frames = HashMap::with_capacity(self.required.len());
        for id in &self.required {
            if let Some(frame) = self
                .buffers
                .get_mut(id)
                .and_then(|buffer| buffer.take_sequence(sequence))
            {
                frames.insert(id.clone(), frame);
            }
        }

        let pruned: usize = self
            .buffers
            .values_mut()
            .map(|buffer| buffer.prune_below(sequence))
            .sum();

        self.counters.bundles_emitted += 1;
        self.counters.frames_pruned += pruned as u64;
        self.last_emitted = Some(sequence);

        let remaining = self.total_buffered();
        metrics::counter!("sync_bundles_total").increment(1);
        if pruned > 0 {
            metrics::counter!("sync_frames_pruned_total").increment(pruned as u64);
        }
        metrics::histogram!("sync_buffered_frames").record(remaining as f64);

        tracing::debug!(sequence, pruned, remaining, "bundle emitted");

        Bundle { sequence, frames }
    }

    /// Channels a bundle must cover, in configuration order
    pub fn required_channels(&self) -> &[ChannelId] {
        &self.required
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Frames currently buffered for `channel`
    pub fn buffered_len(&self, channel: &str) -> usize {
        self.buffers.get(channel).map(|b| b.len()).unwrap_or(0)
    }

    /// Whether `channel` currently buffers a frame with `sequence`
    pub fn contains(&self, channel: &str, sequence: u64) -> bool {
        self.buffers
            .get(channel)
            .map(|b| b.contains_sequence(sequence))
            .unwrap_or(false)
    }

    /// Frames buffered across all channels
    pub fn total_buffered(&self) -> usize {
        self.buffers.values().map(|b| b.len()).sum()
    }

    /// Channels seen so far
    pub fn known_channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<_> = self.buffers.keys().cloned().collect();
        channels.sort();
        channels
    }

    pub fn bundle_count(&self) -> u64 {
        self.counters.bundles_emitted
    }

    pub fn last_emitted_sequence(&self) -> Option<u64> {
        self.last_emitted
    }

    pub fn counters(&self) -> SyncCounters {
        self.counters
    }

    /// Current buffer occupancy
    pub fn buffer_stats(&self) -> BufferStats {
        let mut stats = BufferStats::default();

        for (id, buffer) in &self.buffers {
            stats.depths.insert(id.clone(), buffer.len());
            stats.total_frames += buffer.len();

            if let Some(oldest) = buffer.oldest_sequence() {
                stats.oldest_sequence =
                    Some(stats.oldest_sequence.map_or(oldest, |o| o.min(oldest)));
            }
            if let Some(newest) = buffer.newest_sequence() {
                stats.newest_sequence =
                    Some(stats.newest_sequence.map_or(newest, |n| n.max(newest)));
            }
        }

        stats
    }

    /// Report channels piling up at the depth cap
    ///
    /// `None` while no buffer is saturated, which is always the case without
    /// a configured `max_depth`.
    pub fn stall_report(&self) -> Option<StallReport> {
        let mut saturated: Vec<ChannelId> = self
            .buffers
            .iter()
            .filter(|(_, buffer)| buffer.is_saturated())
            .map(|(id, _)| id.clone())
            .collect();

        if saturated.is_empty() {
            return None;
        }
        saturated.sort();

        let horizon = saturated
            .iter()
            .filter_map(|id| self.buffers.get(id).and_then(|b| b.oldest_sequence()))
            .min();

        let lagging = self
            .required
            .iter()
            .filter(|id| !saturated.contains(*id))
            .filter(|id| {
                let newest = self.buffers.get(id.as_str()).and_then(|b| b.newest_sequence());
                match (newest, horizon) {
                    (Some(newest), Some(horizon)) => newest < horizon,
                    (None, _) => true,
                    (Some(_), None) => false,
                }
            })
            .cloned()
            .collect();

        Some(StallReport { saturated, lagging })
    }

    pub fn is_stalled(&self) -> bool {
        self.buffers.values().any(|b| b.is_saturated())
    }

    /// Drop every buffered frame, keeping configuration and counters
    ///
    /// The ordering watermark is reset too, so a restarted device may begin
    /// again from low sequence numbers.
    pub fn clear(&mut self) -> usize {
        let dropped: usize = self.buffers.values_mut().map(|b| b.clear()).sum();
        self.last_emitted = None;
        tracing::debug!(dropped, "frame synchronizer cleared");
        dropped
    }
}

fn validate_config(config: &SyncConfig) -> Result<(), SyncError> {
    if config.required_channels.is_empty() {
        return Err(SyncError::config_validation(
            "required_channels",
            "at least one required channel is needed",
        ));
    }

    let mut seen = HashSet::new();
    for id in &config.required_channels {
        if id.is_empty() {
            return Err(SyncError::config_validation(
                "required_channels",
                "channel name cannot be empty",
            ));
        }
        if !seen.insert(id) {
            return Err(SyncError::config_validation(
                format!("required_channels[{id}]"),
                "duplicate channel",
            ));
        }
    }

    if config.buffer.max_depth == Some(0) {
        return Err(SyncError::config_validation(
            "buffer.max_depth",
            "max_depth must be > 0",
        ));
    }

    Ok(())
}
