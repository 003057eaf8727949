//! # Contracts
//!
//! Shared types for the depth-sync workspace. Every other crate depends on
//! this one and never the other way round.
//!
//! ## Identity model
//! - A capture instant is identified by a `u64` sequence number assigned by
//!   the device. Frames from different channels belonging to the same
//!   instant carry the same sequence number.
//! - Channels are named by [`ChannelId`].

mod blueprint;
mod bundle;
mod channel_id;
mod error;
mod frame;
mod sync_config;

pub use blueprint::*;
pub use bundle::*;
pub use channel_id::ChannelId;
pub use error::*;
pub use frame::*;
pub use sync_config::*;
