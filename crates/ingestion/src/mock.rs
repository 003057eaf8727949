//! Mock channel source
//!
//! Emits synthetic frames for one channel without a device attached.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use contracts::{ChannelConfig, ChannelId, ChannelKind, Frame, FramePayload, ImageData};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{IngestionError, Result};
use crate::queue::{ChannelSender, SendOutcome};

/// Slowest tick rate a mock source runs at
const MIN_FREQUENCY_HZ: f64 = 1e-3;

/// Mock source configuration
#[derive(Debug, Clone)]
pub struct MockChannelConfig {
    pub channel: ChannelId,

    pub kind: ChannelKind,

    /// Emission rate (Hz)
    pub frequency_hz: f64,

    pub width: u32,

    pub height: u32,

    /// First sequence number
    pub sequence_offset: u64,

    /// Omit every Nth sequence number (0 = never), simulating a frame the
    /// device dropped
    pub skip_every: u64,

    /// Stop after this many sequence numbers (skipped ones included)
    pub max_sequences: Option<u64>,
}

impl Default for MockChannelConfig {
    fn default() -> Self {
        Self {
            channel: ChannelId::new("depth"),
            kind: ChannelKind::Depth,
            frequency_hz: 30.0,
            width: 640,
            height: 400,
            sequence_offset: 0,
            skip_every: 0,
            max_sequences: None,
        }
    }
}

impl MockChannelConfig {
    /// Mirror a declared channel
    pub fn from_channel(channel: &ChannelConfig) -> Self {
        Self {
            channel: channel.id.clone(),
            kind: channel.kind,
            frequency_hz: channel.frequency_hz,
            width: channel.width,
            height: channel.height,
            sequence_offset: channel.sequence_offset,
            skip_every: channel.skip_every,
            max_sequences: None,
        }
    }

    /// Sequence number for tick `index`, `None` when that tick is skipped
    pub fn sequence_at(&self, index: u64) -> Option<u64> {
        if self.skip_every > 0 && (index + 1) % self.skip_every == 0 {
            return None;
        }
        Some(self.sequence_offset + index)
    }

    /// Time between ticks; rates below 1 mHz (or NaN) are clamped
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency_hz.max(MIN_FREQUENCY_HZ))
    }

    fn payload(&self) -> FramePayload {
        let format = self.kind.image_format();
        let size = self.width as usize * self.height as usize * format.bytes_per_pixel();
        FramePayload::Image(ImageData {
            width: self.width,
            height: self.height,
            format,
            data: Bytes::from(vec![128u8; size]),
        })
    }
}

/// Mock channel source
///
/// Runs as a tokio task pushing into a [`ChannelSender`]. The task ends on
/// [`stop`](Self::stop), after `max_sequences`, or once the consumer side of
/// the queue is gone; the sender is dropped with it, which closes the queue.
pub struct MockChannelSource {
    config: MockChannelConfig,
    running: Arc<AtomicBool>,
}

impl MockChannelSource {
    pub fn new(config: MockChannelConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_channel(channel: &ChannelConfig) -> Self {
        Self::new(MockChannelConfig::from_channel(channel))
    }

    pub fn with_max_sequences(mut self, max_sequences: u64) -> Self {
        self.config.max_sequences = Some(max_sequences);
        self
    }

    /// Spawn the producer task
    ///
    /// The handle resolves to the number of frames offered to the queue.
    pub fn start(&self, sender: ChannelSender) -> Result<JoinHandle<u64>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(IngestionError::AlreadyRunning {
                channel: self.config.channel.to_string(),
            });
        }

        let config = self.config.clone();
        let running = self.running.clone();

        Ok(tokio::spawn(async move {
            let interval = config.interval();
            // All frames of one source share a single pixel buffer.
            let payload = config.payload();
            let mut sent: u64 = 0;
            let mut index: u64 = 0;

            debug!(
                channel = %config.channel,
                kind = ?config.kind,
                frequency_hz = config.frequency_hz,
                "mock channel source started"
            );

            while running.load(Ordering::Relaxed) {
                if config.max_sequences.is_some_and(|max| index >= max) {
                    break;
                }

                if let Some(sequence) = config.sequence_at(index) {
                    let frame = Frame::new(config.channel.clone(), sequence, payload.clone());
                    match sender.send(frame) {
                        Ok(outcome) => {
                            sent += 1;
                            if outcome != SendOutcome::Queued {
                                trace!(channel = %config.channel, sequence, ?outcome, "queue full");
                            }
                        }
                        Err(_) => {
                            debug!(channel = %config.channel, "mock channel consumer gone");
                            break;
                        }
                    }
                } else {
                    trace!(channel = %config.channel, index, "mock frame skipped");
                }

                index += 1;
                tokio::time::sleep(interval).await;
            }

            running.store(false, Ordering::SeqCst);
            debug!(channel = %config.channel, sent, "mock channel source stopped");
            sent
        }))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn channel(&self) -> &ChannelId {
        &self.config.channel
    }
}
