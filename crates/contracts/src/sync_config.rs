//! Synchronizer configuration shared across crates.

use serde::{Deserialize, Serialize};

use crate::ChannelId;

/// Frame synchronizer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Channels that must all contribute a frame before a bundle is emitted
    pub required_channels: Vec<ChannelId>,

    /// Per-channel buffer limits
    #[serde(default)]
    pub buffer: BufferConfig,

    /// What to do with frames from channels outside `required_channels`
    #[serde(default)]
    pub unlisted_channels: UnlistedChannelPolicy,

    /// What to do with frames older than the last emitted bundle
    #[serde(default)]
    pub arrival: ArrivalPolicy,
}

impl SyncConfig {
    /// Unbounded buffers, unlisted channels buffered
    pub fn new<I, S>(required_channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ChannelId>,
    {
        Self {
            required_channels: required_channels.into_iter().map(Into::into).collect(),
            buffer: BufferConfig::default(),
            unlisted_channels: UnlistedChannelPolicy::default(),
            arrival: ArrivalPolicy::default(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize, overflow: DropPolicy) -> Self {
        self.buffer = BufferConfig {
            max_depth: Some(max_depth),
            overflow,
        };
        self
    }

    pub fn with_unlisted_channels(mut self, policy: UnlistedChannelPolicy) -> Self {
        self.unlisted_channels = policy;
        self
    }

    pub fn with_arrival_policy(mut self, policy: ArrivalPolicy) -> Self {
        self.arrival = policy;
        self
    }
}

/// Buffer configuration
///
/// `max_depth = None` keeps buffers unbounded: if one required channel
/// stops delivering, the others grow until it resumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum frames held per channel
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Which frame to discard when a capped buffer is full
    #[serde(default)]
    pub overflow: DropPolicy,
}

/// Drop policy for full buffers and queues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Discard the oldest held frame to make room
    #[default]
    DropOldest,
    /// Discard the arriving frame
    DropNewest,
}

/// Handling of frames from channels that are not required
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlistedChannelPolicy {
    /// Keep them in their own buffer; they never take part in matching
    #[default]
    Buffer,
    /// Drop them on arrival
    Discard,
}

/// Handling of frames whose sequence is below the last emitted bundle
///
/// With `Accept` every frame is buffered, so a device that restarts its
/// sequence numbers keeps producing bundles, at the cost of a bundle order
/// that goes backwards across the restart. `DiscardStale` keeps bundle
/// sequences non-decreasing; a restarted device then needs
/// `FrameSynchronizer::clear`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalPolicy {
    /// Buffer every arrival
    #[default]
    Accept,
    /// Drop arrivals older than the last emitted bundle
    DiscardStale,
}
