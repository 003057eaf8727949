//! PipelineBlueprint - config loader output
//!
//! Describes the device, its output channels and the synchronization policy.

use serde::{Deserialize, Serialize};

use crate::{
    ArrivalPolicy, BufferConfig, ChannelId, ChannelKind, DropPolicy, SyncConfig,
    UnlistedChannelPolicy,
};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    pub device: DeviceConfig,

    /// Output channels of the device
    pub channels: Vec<ChannelConfig>,

    /// Synchronization policy
    #[serde(default)]
    pub sync: SyncSection,
}

/// Device settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Display name
    #[serde(default = "default_device_name")]
    pub name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
        }
    }
}

fn default_device_name() -> String {
    "camera".to_string()
}

/// One output channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Unique channel name
    pub id: ChannelId,

    pub kind: ChannelKind,

    /// Frame rate (Hz), must be > 0
    pub frequency_hz: f64,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Host-side queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// What a full host-side queue discards
    #[serde(default)]
    pub queue_policy: DropPolicy,

    /// First sequence number emitted (mock sources)
    #[serde(default)]
    pub sequence_offset: u64,

    /// Skip every Nth sequence number, 0 = never (mock sources)
    #[serde(default)]
    pub skip_every: u64,
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    400
}

// The device drops frames rather than blocking when the host falls behind.
fn default_queue_capacity() -> usize {
    1
}

/// Synchronization policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSection {
    /// Channels required for a bundle. Empty = every declared channel.
    #[serde(default)]
    pub required_channels: Vec<ChannelId>,

    #[serde(default)]
    pub unlisted_channels: UnlistedChannelPolicy,

    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub arrival: ArrivalPolicy,
}

impl PipelineBlueprint {
    /// Build the synchronizer configuration
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            required_channels: self.required_channels(),
            buffer: self.sync.buffer,
            unlisted_channels: self.sync.unlisted_channels,
            arrival: self.sync.arrival,
        }
    }

    /// Required channels after applying the "empty = all" default
    pub fn required_channels(&self) -> Vec<ChannelId> {
        if self.sync.required_channels.is_empty() {
            self.channels.iter().map(|c| c.id.clone()).collect()
        } else {
            self.sync.required_channels.clone()
        }
    }

    pub fn channel(&self, id: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.id == id)
    }
}
