//! # Sync Engine
//!
//! Multi-stream frame synchronizer keyed by device sequence numbers.
//!
//! Responsibilities:
//! - buffer frames per channel in arrival order
//! - emit a [`Bundle`] once every required channel holds the arriving sequence
//! - prune frames older than each emitted bundle
//! - optional per-channel depth cap with stall reporting
//!
//! ## Usage
//!
//! ```
//! use sync_engine::{FrameSynchronizer, SyncConfig};
//!
//! let mut sync = FrameSynchronizer::new(SyncConfig::new(["depth", "color"])).unwrap();
//!
//! assert!(sync.add_frame("depth", 1, "D1").is_none());
//! let bundle = sync.add_frame("color", 1, "C1").unwrap();
//! assert_eq!(bundle.payload("depth"), Some(&"D1"));
//! ```

mod buffer;
mod engine;

pub use buffer::{ChannelBuffer, PushOutcome};
pub use engine::FrameSynchronizer;

// Re-export contracts types
pub use contracts::{
    BufferConfig, BufferStats, Bundle, ChannelId, DropPolicy, Frame, StallReport, SyncConfig,
    SyncCounters, SyncError, UnlistedChannelPolicy,
};
