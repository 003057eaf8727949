//! Per-channel frame queue
//!
//! A bounded `async-channel` queue that never blocks the producer. When the
//! queue is full the configured [`DropPolicy`] decides which frame is lost:
//! `DropOldest` pops the head through a receiver handle kept on the sender
//! side, so the consumer always sees the most recent frames.

use std::sync::Arc;

use async_channel::{Receiver, Sender, TryRecvError, TrySendError};
use contracts::{ChannelId, DropPolicy, Frame, FramePayload};
use tracing::{trace, warn};

use crate::config::{IngestionMetrics, QueueConfig};
use crate::error::{IngestionError, Result};

/// Outcome of [`ChannelSender::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame queued
    Queued,
    /// Frame queued after discarding the oldest queued frame
    ReplacedOldest,
    /// Queue full, frame discarded
    Dropped,
}

/// Create the queue for one channel
pub fn channel_queue<P>(
    channel: impl Into<ChannelId>,
    config: QueueConfig,
) -> (ChannelSender<P>, ChannelReceiver<P>) {
    let channel = channel.into();
    let (tx, rx) = async_channel::bounded(config.capacity.max(1));
    let metrics = Arc::new(IngestionMetrics::new());

    let sender = ChannelSender {
        channel: channel.clone(),
        tx,
        evictor: rx.clone(),
        policy: config.drop_policy,
        metrics: metrics.clone(),
    };
    let receiver = ChannelReceiver {
        channel,
        rx,
        metrics,
    };
    (sender, receiver)
}

/// Producer side of a channel queue
#[derive(Debug)]
pub struct ChannelSender<P = FramePayload> {
    channel: ChannelId,
    tx: Sender<Frame<P>>,
    /// Used only to discard the head on `DropOldest`
    evictor: Receiver<Frame<P>>,
    policy: DropPolicy,
    metrics: Arc<IngestionMetrics>,
}

impl<P> Clone for ChannelSender<P> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            tx: self.tx.clone(),
            evictor: self.evictor.clone(),
            policy: self.policy,
            metrics: self.metrics.clone(),
        }
    }
}

impl<P> ChannelSender<P> {
    /// Offer a frame without blocking
    ///
    /// # Errors
    /// `ChannelClosed` once the consumer side has been dropped.
    pub fn send(&self, frame: Frame<P>) -> Result<SendOutcome> {
        if self.consumer_gone() {
            return Err(IngestionError::channel_closed(self.channel.as_str()));
        }
        self.metrics.record_offered();

        match self.tx.try_send(frame) {
            Ok(()) => Ok(SendOutcome::Queued),
            Err(TrySendError::Full(frame)) => self.on_full(frame),
            Err(TrySendError::Closed(_)) => {
                Err(IngestionError::channel_closed(self.channel.as_str()))
            }
        }
    }

    fn on_full(&self, frame: Frame<P>) -> Result<SendOutcome> {
        match self.policy {
            DropPolicy::DropNewest => {
                trace!(channel = %self.channel, sequence = frame.sequence, "frame dropped (newest)");
                self.record_drop();
                Ok(SendOutcome::Dropped)
            }
            DropPolicy::DropOldest => {
                // The consumer may have drained the queue in between; only count a real eviction.
                if let Ok(oldest) = self.evictor.try_recv() {
                    trace!(channel = %self.channel, sequence = oldest.sequence, "frame dropped (oldest)");
                    self.record_drop();
                }
                match self.tx.try_send(frame) {
                    Ok(()) => Ok(SendOutcome::ReplacedOldest),
                    Err(TrySendError::Full(_)) => {
                        self.record_drop();
                        Ok(SendOutcome::Dropped)
                    }
                    Err(TrySendError::Closed(_)) => {
                        Err(IngestionError::channel_closed(self.channel.as_str()))
                    }
                }
            }
        }
    }

    fn record_drop(&self) {
        self.metrics.record_dropped();
        metrics::counter!("ingestion_frames_dropped_total", "channel" => self.channel.to_string())
            .increment(1);
    }

    /// Every sender holds one evictor, so only evictors are left
    fn consumer_gone(&self) -> bool {
        self.tx.receiver_count() <= self.tx.sender_count()
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }
}

/// Consumer side of a channel queue
#[derive(Debug)]
pub struct ChannelReceiver<P = FramePayload> {
    channel: ChannelId,
    rx: Receiver<Frame<P>>,
    metrics: Arc<IngestionMetrics>,
}

impl<P> ChannelReceiver<P> {
    /// Non-blocking receive
    ///
    /// `Ok(None)` when the queue is empty; `Err(ChannelClosed)` once it is
    /// empty and every producer has been dropped.
    pub fn try_recv(&self) -> Result<Option<Frame<P>>> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(self.on_received(frame))),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => {
                Err(IngestionError::channel_closed(self.channel.as_str()))
            }
        }
    }

    /// Wait for the next frame
    pub async fn recv(&self) -> Result<Frame<P>> {
        match self.rx.recv().await {
            Ok(frame) => Ok(self.on_received(frame)),
            Err(_) => {
                warn!(channel = %self.channel, "queue closed");
                Err(IngestionError::channel_closed(self.channel.as_str()))
            }
        }
    }

    fn on_received(&self, frame: Frame<P>) -> Frame<P> {
        self.metrics.record_received();
        self.metrics.update_queue_len(self.rx.len());
        frame
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Frames currently queued
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }
}
