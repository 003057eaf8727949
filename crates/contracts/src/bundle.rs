//! Bundle - synchronizer output
//!
//! One frame per required channel, all from the same capture instant.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{ChannelId, Frame, FramePayload};

/// Time-aligned set of frames
///
/// Holds exactly one frame for every required channel of the synchronizer
/// that produced it. All frames share [`Bundle::sequence`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle<P = FramePayload> {
    /// Shared sequence number
    pub sequence: u64,

    /// channel -> frame
    pub frames: HashMap<ChannelId, Frame<P>>,
}

impl<P> Bundle<P> {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, channel: &str) -> Option<&Frame<P>> {
        self.frames.get(channel)
    }

    pub fn payload(&self, channel: &str) -> Option<&P> {
        self.frames.get(channel).map(|frame| &frame.payload)
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.frames.contains_key(channel)
    }

    /// Channel names in sorted order
    pub fn channels(&self) -> Vec<&ChannelId> {
        let mut channels: Vec<_> = self.frames.keys().collect();
        channels.sort();
        channels
    }

    /// Take ownership of the payloads, keyed by channel
    pub fn into_payloads(self) -> HashMap<ChannelId, P> {
        self.frames
            .into_iter()
            .map(|(channel, frame)| (channel, frame.payload))
            .collect()
    }
}

/// Buffer occupancy snapshot (for diagnostics)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Frames buffered per channel
    pub depths: HashMap<ChannelId, usize>,

    /// Total buffered frames
    pub total_frames: usize,

    /// Lowest buffered sequence across channels
    pub oldest_sequence: Option<u64>,

    /// Highest buffered sequence across channels
    pub newest_sequence: Option<u64>,
}

/// Lifetime counters of one synchronizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounters {
    /// Frames accepted into a buffer
    pub frames_buffered: u64,

    /// Bundles handed to the caller
    pub bundles_emitted: u64,

    /// Frames discarded because a later bundle made them stale
    pub frames_pruned: u64,

    /// Frames discarded by the depth cap
    pub frames_evicted: u64,

    /// Frames rejected on arrival because their sequence was already passed
    pub frames_stale: u64,

    /// Frames rejected on arrival from channels outside the required set
    pub frames_unlisted: u64,
}

/// Signal that channels are piling up behind a stalled one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StallReport {
    /// Channels whose buffer is at the depth cap
    pub saturated: Vec<ChannelId>,

    /// Required channels with nothing that could still match the saturated ones
    pub lagging: Vec<ChannelId>,
}
