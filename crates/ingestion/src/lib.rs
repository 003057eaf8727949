//! # Ingestion
//!
//! Host side of the camera pipeline.
//!
//! Responsibilities:
//! - One bounded queue per channel that never blocks the producer
//! - Drop policy for full queues (oldest or newest frame)
//! - Mock channel sources for running without a device
//! - A polling driver feeding every queue into the frame synchronizer
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{channel_queue, MockChannelSource, QueueConfig, RunLimits, SyncDriver};
//!
//! let (tx, rx) = channel_queue("depth", QueueConfig::default());
//! let source = MockChannelSource::from_channel(&channel_config);
//! source.start(tx)?;
//!
//! let mut driver = SyncDriver::new(synchronizer).with_receivers([rx])?;
//! let stats = driver.run(RunLimits::default(), |bundle| println!("{}", bundle.sequence)).await;
//! ```

mod config;
mod driver;
mod error;
mod mock;
mod queue;

pub use config::{DropPolicy, IngestionMetrics, MetricsSnapshot, QueueConfig};
pub use driver::{DriverEvent, DriverStats, RunLimits, StopReason, SyncDriver};
pub use error::{IngestionError, Result};
pub use mock::{MockChannelConfig, MockChannelSource};
pub use queue::{ChannelReceiver, ChannelSender, SendOutcome, channel_queue};
