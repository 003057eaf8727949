//! Ingestion error types

use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Every producer (or the consumer) of a channel queue has gone away
    #[error("queue closed for channel {channel}")]
    ChannelClosed {
        /// Channel name
        channel: String,
    },

    /// Mock source started twice
    #[error("source for channel {channel} is already running")]
    AlreadyRunning {
        /// Channel name
        channel: String,
    },

    /// Two receivers registered for one channel
    #[error("channel {channel} already has a receiver")]
    DuplicateReceiver {
        /// Channel name
        channel: String,
    },
}

impl IngestionError {
    pub fn channel_closed(channel: impl Into<String>) -> Self {
        Self::ChannelClosed {
            channel: channel.into(),
        }
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
