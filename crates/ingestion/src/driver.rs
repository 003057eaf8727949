//! Polling driver
//!
//! Funnels every channel queue into one [`FrameSynchronizer`] from a single
//! task: each pass makes one non-blocking receive per open channel and
//! feeds whatever arrived to the synchronizer.

use std::time::Duration;

use contracts::{Bundle, ChannelId, FramePayload, StallReport};
use sync_engine::FrameSynchronizer;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestionError, Result};
use crate::queue::ChannelReceiver;

/// Limits for [`SyncDriver::run`]
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Stop after this many bundles
    pub max_bundles: Option<u64>,

    /// Stop after this much wall time
    pub timeout: Option<Duration>,

    /// Sleep between passes that received nothing
    pub idle_sleep: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_bundles: None,
            timeout: None,
            idle_sleep: Duration::from_millis(1),
        }
    }
}

impl RunLimits {
    pub fn with_max_bundles(mut self, max_bundles: u64) -> Self {
        self.max_bundles = Some(max_bundles);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Why [`SyncDriver::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxBundles,
    Timeout,
    /// Every channel queue closed and drained
    AllClosed,
}

/// Driver statistics
#[derive(Debug, Clone, Default)]
pub struct DriverStats {
    /// Frames taken off the queues
    pub frames_received: u64,

    pub bundles_emitted: u64,

    /// Polling passes
    pub passes: u64,

    /// Passes that received nothing
    pub idle_passes: u64,

    pub channels_closed: usize,

    /// Transitions into a stalled state
    pub stall_events: u64,

    pub elapsed: Duration,

    /// `None` while running or if the run was cancelled
    pub stop_reason: Option<StopReason>,
}

/// Delivered to the [`SyncDriver::run`] callback
#[derive(Debug)]
pub enum DriverEvent<P = FramePayload> {
    /// A completed bundle, in emission order
    Bundle(Bundle<P>),
    /// The synchronizer just entered a stalled state
    Stalled(StallReport),
}

struct Slot<P> {
    receiver: ChannelReceiver<P>,
    closed: bool,
}

/// Host-side polling loop around a [`FrameSynchronizer`]
pub struct SyncDriver<P = FramePayload> {
    synchronizer: FrameSynchronizer<P>,
    slots: Vec<Slot<P>>,
    stats: DriverStats,
    stalled: bool,
    pending_stall: Option<StallReport>,
}

impl<P> SyncDriver<P> {
    pub fn new(synchronizer: FrameSynchronizer<P>) -> Self {
        Self {
            synchronizer,
            slots: Vec::new(),
            stats: DriverStats::default(),
            stalled: false,
            pending_stall: None,
        }
    }

    /// Register a channel queue
    ///
    /// # Errors
    /// `DuplicateReceiver` when the channel already has one.
    pub fn add_receiver(&mut self, receiver: ChannelReceiver<P>) -> Result<()> {
        if self.slots.iter().any(|s| s.receiver.channel() == receiver.channel()) {
            return Err(IngestionError::DuplicateReceiver {
                channel: receiver.channel().to_string(),
            });
        }
        debug!(channel = %receiver.channel(), "receiver registered");
        self.slots.push(Slot {
            receiver,
            closed: false,
        });
        Ok(())
    }

    pub fn with_receivers<I>(mut self, receivers: I) -> Result<Self>
    where
        I: IntoIterator<Item = ChannelReceiver<P>>,
    {
        for receiver in receivers {
            self.add_receiver(receiver)?;
        }
        Ok(self)
    }

    /// One pass: a single non-blocking receive per open channel
    ///
    /// Returns the bundles completed during the pass, in emission order.
    pub fn poll_once(&mut self) -> Vec<Bundle<P>> {
        let mut bundles = Vec::new();
        self.poll_with(|bundle, _| bundles.push(bundle));
        bundles
    }

    /// One pass, handing each bundle over before the next frame is fed
    #[instrument(level = "trace", name = "sync_driver_poll", skip_all)]
    fn poll_with<F>(&mut self, mut on_bundle: F)
    where
        F: FnMut(Bundle<P>, &FrameSynchronizer<P>),
    {
        let mut received = 0u64;

        for slot in self.slots.iter_mut().filter(|s| !s.closed) {
            match slot.receiver.try_recv() {
                Ok(Some(frame)) => {
                    received += 1;
                    if let Some(bundle) = self.synchronizer.push(frame) {
                        self.stats.bundles_emitted += 1;
                        on_bundle(bundle, &self.synchronizer);
                    }
                }
                Ok(None) => {}
                Err(_) => {
                    slot.closed = true;
                    self.stats.channels_closed += 1;
                    warn!(channel = %slot.receiver.channel(), "channel queue closed");
                }
            }
        }

        self.stats.passes += 1;
        self.stats.frames_received += received;
        if received == 0 {
            self.stats.idle_passes += 1;
        }
        self.check_stall();
    }

    /// Poll until a limit is hit or every queue is closed
    ///
    /// `on_event` sees every bundle in emission order, along with the
    /// synchronizer state right after that bundle was emitted. A stall is
    /// reported once the pass that caused it has finished. Dropping the returned future
    /// cancels the run; the state and statistics stay on the driver.
    pub async fn run<F>(&mut self, limits: RunLimits, mut on_event: F) -> DriverStats
    where
        F: FnMut(DriverEvent<P>, &FrameSynchronizer<P>),
    {
        let started = Instant::now();
        let deadline = limits.timeout.map(|t| started + t);
        let start_bundles = self.stats.bundles_emitted;
        self.stats.stop_reason = None;

        info!(
            channels = self.slots.len(),
            max_bundles = ?limits.max_bundles,
            timeout = ?limits.timeout,
            "sync driver started"
        );

        let reason = loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break StopReason::Timeout;
            }

            let before = self.stats.frames_received;
            // Bundles completed in the same pass are all delivered, so a run
            // may end slightly past `max_bundles`.
            self.poll_with(|bundle, sync| on_event(DriverEvent::Bundle(bundle), sync));
            if let Some(report) = self.pending_stall.take() {
                on_event(DriverEvent::Stalled(report), &self.synchronizer);
            }
            let emitted = self.stats.bundles_emitted - start_bundles;
            if limits.max_bundles.is_some_and(|max| emitted >= max) {
                break StopReason::MaxBundles;
            }

            if self.stats.frames_received == before {
                if self.all_closed() {
                    break StopReason::AllClosed;
                }
                tokio::time::sleep(limits.idle_sleep).await;
            } else {
                tokio::task::yield_now().await;
            }
        };

        self.stats.elapsed += started.elapsed();
        self.stats.stop_reason = Some(reason);
        info!(
            reason = ?reason,
            bundles = self.stats.bundles_emitted,
            frames = self.stats.frames_received,
            "sync driver stopped"
        );
        self.stats.clone()
    }

    fn check_stall(&mut self) {
        let stalled = self.synchronizer.is_stalled();
        if stalled && !self.stalled {
            self.stats.stall_events += 1;
            if let Some(report) = self.synchronizer.stall_report() {
                warn!(
                    saturated = ?report.saturated,
                    lagging = ?report.lagging,
                    "synchronizer stalled"
                );
                self.pending_stall = Some(report);
            }
        }
        self.stalled = stalled;
    }

    /// Stall report raised by the last [`poll_once`](Self::poll_once), if any
    pub fn take_stall(&mut self) -> Option<StallReport> {
        self.pending_stall.take()
    }

    /// Whether every registered queue has closed
    pub fn all_closed(&self) -> bool {
        self.slots.iter().all(|s| s.closed)
    }

    pub fn channels(&self) -> Vec<ChannelId> {
        self.slots.iter().map(|s| s.receiver.channel().clone()).collect()
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    pub fn synchronizer(&self) -> &FrameSynchronizer<P> {
        &self.synchronizer
    }

    pub fn synchronizer_mut(&mut self) -> &mut FrameSynchronizer<P> {
        &mut self.synchronizer
    }

    pub fn into_synchronizer(self) -> FrameSynchronizer<P> {
        self.synchronizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::queue::{ChannelSender, channel_queue};
    use contracts::{DropPolicy, Frame, SyncConfig};

    fn driver(channels: &[&str]) -> (SyncDriver<u64>, Vec<ChannelSender<u64>>) {
        let sync = FrameSynchronizer::new(SyncConfig::new(channels.iter().copied())).unwrap();
        let mut driver = SyncDriver::new(sync);
        let mut senders = Vec::new();
        for &channel in channels {
            let (tx, rx) = channel_queue(channel, QueueConfig::new(8, DropPolicy::DropNewest));
            driver.add_receiver(rx).unwrap();
            senders.push(tx);
        }
        (driver, senders)
    }

    #[test]
    fn test_poll_once_emits_bundle() {
        let (mut driver, senders) = driver(&["depth", "color"]);
        senders[0].send(Frame::new("depth", 1, 10)).unwrap();
        senders[1].send(Frame::new("color", 1, 20)).unwrap();

        let bundles = driver.poll_once();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].sequence, 1);
        assert_eq!(driver.stats().frames_received, 2);
    }

    #[test]
    fn test_poll_once_takes_one_frame_per_channel() {
        let (mut driver, senders) = driver(&["depth", "color"]);
        for s in 1..=3 {
            senders[0].send(Frame::new("depth", s, s)).unwrap();
        }

        assert!(driver.poll_once().is_empty());
        assert_eq!(driver.stats().frames_received, 1);
        assert_eq!(driver.synchronizer().buffered_len("depth"), 1);
    }

    #[test]
    fn test_duplicate_receiver_rejected() {
        let (mut driver, _senders) = driver(&["depth"]);
        let (_tx, rx) = channel_queue::<u64>("depth", QueueConfig::default());
        assert!(matches!(
            driver.add_receiver(rx),
            Err(IngestionError::DuplicateReceiver { .. })
        ));
    }

    #[test]
    fn test_closed_channels_detected() {
        let (mut driver, senders) = driver(&["depth", "color"]);
        drop(senders);
        driver.poll_once();
        assert!(driver.all_closed());
        assert_eq!(driver.stats().channels_closed, 2);
    }

    #[tokio::test]
    async fn test_run_until_all_closed() {
        let (mut driver, senders) = driver(&["depth", "color"]);
        for s in 0..4 {
            senders[0].send(Frame::new("depth", s, s)).unwrap();
            senders[1].send(Frame::new("color", s, s)).unwrap();
        }
        drop(senders);

        let mut seen = Vec::new();
        let stats = driver
            .run(RunLimits::default(), |event, _| {
                if let DriverEvent::Bundle(b) = event {
                    seen.push(b.sequence);
                }
            })
            .await;

        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(stats.stop_reason, Some(StopReason::AllClosed));
        assert_eq!(stats.bundles_emitted, 4);
    }

    #[tokio::test]
    async fn test_run_stops_at_max_bundles() {
        let (mut driver, senders) = driver(&["depth"]);
        for s in 0..6 {
            senders[0].send(Frame::new("depth", s, s)).unwrap();
        }

        let limits = RunLimits::default().with_max_bundles(3);
        let mut count = 0;
        let stats = driver
            .run(limits, |event, _| {
                if matches!(event, DriverEvent::Bundle(_)) {
                    count += 1;
                }
            })
            .await;

        assert_eq!(count, 3);
        assert_eq!(stats.stop_reason, Some(StopReason::MaxBundles));
    }

    #[tokio::test]
    async fn test_run_times_out_on_missing_channel() {
        let (mut driver, senders) = driver(&["depth", "color"]);
        senders[0].send(Frame::new("depth", 1, 1)).unwrap();

        let limits = RunLimits::default().with_timeout(Duration::from_millis(20));
        let stats = driver
            .run(limits, |event, _| {
                assert!(!matches!(event, DriverEvent::Bundle(_)), "no bundle expected");
            })
            .await;

        assert_eq!(stats.stop_reason, Some(StopReason::Timeout));
        assert_eq!(stats.bundles_emitted, 0);
        drop(senders);
    }

    #[test]
    fn test_stall_event_counted_once() {
        let sync = FrameSynchronizer::new(
            SyncConfig::new(["depth", "color"]).with_max_depth(2, DropPolicy::DropOldest),
        )
        .unwrap();
        let mut driver = SyncDriver::new(sync);
        let (tx, rx) = channel_queue("depth", QueueConfig::new(8, DropPolicy::DropNewest));
        driver.add_receiver(rx).unwrap();

        let mut reports = Vec::new();
        for s in 0..6 {
            tx.send(Frame::new("depth", s, s)).unwrap();
            driver.poll_once();
            reports.extend(driver.take_stall());
        }
        assert_eq!(driver.stats().stall_events, 1);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].lagging, vec![ChannelId::new("color")]);
    }

    #[tokio::test]
    async fn test_run_hands_synchronizer_state_to_callback() {
        let (mut driver, senders) = driver(&["depth", "color"]);
        senders[0].send(Frame::new("depth", 1, 1)).unwrap();
        senders[0].send(Frame::new("depth", 2, 2)).unwrap();
        senders[1].send(Frame::new("color", 1, 1)).unwrap();
        drop(senders);

        let mut buffered = Vec::new();
        driver
            .run(RunLimits::default(), |event, sync| {
                if let DriverEvent::Bundle(_) = event {
                    buffered.push(sync.total_buffered());
                }
            })
            .await;
        // depth 2 was still queued when the bundle for 1 completed
        assert_eq!(buffered, vec![0]);
        assert_eq!(driver.synchronizer().buffered_len("depth"), 1);
    }

    #[tokio::test]
    async fn test_two_bundles_in_one_pass_see_their_own_state() {
        let (mut driver, senders) = driver(&["depth", "color"]);
        driver.synchronizer_mut().add_frame("depth", 2, 0);
        driver.synchronizer_mut().add_frame("color", 1, 0);

        // Both arrive in the same pass and each completes a bundle
        senders[0].send(Frame::new("depth", 1, 1)).unwrap();
        senders[1].send(Frame::new("color", 2, 2)).unwrap();

        let mut seen = Vec::new();
        let stats = driver
            .run(RunLimits::default().with_max_bundles(2), |event, sync| {
                if let DriverEvent::Bundle(bundle) = event {
                    seen.push((bundle.sequence, sync.total_buffered()));
                }
            })
            .await;

        assert_eq!(stats.passes, 1);
        assert_eq!(stats.stop_reason, Some(StopReason::MaxBundles));
        assert_eq!(seen, vec![(1, 1), (2, 0)]);
    }
}
