//! # Integration Tests
//!
//! End-to-end tests across crates.
//!
//! Covers:
//! - configuration to synchronizer wiring
//! - mock sources -> channel queues -> driver -> bundles
//! - stall reporting with a silent required channel

#[cfg(test)]
mod contract_tests {
    use contracts::{ArrivalPolicy, ChannelId, ConfigVersion, PipelineBlueprint, SyncConfig};

    #[test]
    fn test_blueprint_version_defaults_to_v1() {
        let blueprint: PipelineBlueprint = serde_json::from_str(r#"{ "channels": [] }"#).unwrap();
        assert_eq!(blueprint.version, ConfigVersion::V1);
        assert_eq!(blueprint.device.name, "camera");

        let blueprint: PipelineBlueprint =
            serde_json::from_str(r#"{ "version": "V1", "channels": [] }"#).unwrap();
        assert_eq!(blueprint.version, ConfigVersion::V1);

        let err = serde_json::from_str::<PipelineBlueprint>(r#"{ "version": "V2", "channels": [] }"#)
            .unwrap_err();
        assert!(err.to_string().contains("V2"), "got: {err}");
    }

    #[test]
    fn test_sync_config_json_shape() {
        let config: SyncConfig = serde_json::from_str(
            r#"{ "required_channels": ["depth", "colorize"], "buffer": { "max_depth": 8 } }"#,
        )
        .unwrap();
        assert_eq!(config.required_channels[1], ChannelId::new("colorize"));
        assert_eq!(config.buffer.max_depth, Some(8));
        assert_eq!(config.arrival, ArrivalPolicy::Accept);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        Bundle, ChannelId, ChannelKind, DropPolicy, Frame, FramePayload, ImageFormat, StallReport,
        SyncConfig,
    };
    use ingestion::{
        ChannelReceiver, DriverEvent, MockChannelConfig, MockChannelSource, QueueConfig,
        RunLimits, StopReason, SyncDriver, channel_queue,
    };
    use observability::BundleMetricsAggregator;
    use sync_engine::FrameSynchronizer;

    const STREAMS: [(&str, ChannelKind); 4] = [
        ("depth", ChannelKind::Depth),
        ("colorize", ChannelKind::Color),
        ("rectified_left", ChannelKind::RectifiedLeft),
        ("rectified_right", ChannelKind::RectifiedRight),
    ];

    fn mock(channel: &str, kind: ChannelKind) -> MockChannelConfig {
        MockChannelConfig {
            channel: ChannelId::new(channel),
            kind,
            frequency_hz: 500.0,
            width: 8,
            height: 4,
            ..Default::default()
        }
    }

    /// Start a source feeding a lossless queue
    fn start(config: MockChannelConfig, sources: &mut Vec<MockChannelSource>) -> ChannelReceiver {
        let (tx, rx) = channel_queue(
            config.channel.clone(),
            QueueConfig::new(256, DropPolicy::DropNewest),
        );
        let source = MockChannelSource::new(config);
        source.start(tx).unwrap();
        sources.push(source);
        rx
    }

    async fn collect(driver: &mut SyncDriver, limits: RunLimits) -> (Vec<Bundle>, Vec<StallReport>) {
        let mut bundles = Vec::new();
        let mut stalls = Vec::new();
        driver
            .run(limits, |event, _| match event {
                DriverEvent::Bundle(bundle) => bundles.push(bundle),
                DriverEvent::Stalled(report) => stalls.push(report),
            })
            .await;
        (bundles, stalls)
    }

    /// Four camera streams -> queues -> driver -> bundles
    #[tokio::test]
    async fn test_e2e_four_stream_pipeline() {
        let sync = FrameSynchronizer::new(SyncConfig::new(STREAMS.map(|(id, _)| id))).unwrap();
        let mut driver = SyncDriver::new(sync);
        let mut sources = Vec::new();
        for (id, kind) in STREAMS {
            driver.add_receiver(start(mock(id, kind), &mut sources)).unwrap();
        }

        let limits = RunLimits::default()
            .with_max_bundles(5)
            .with_timeout(Duration::from_secs(5));
        let (bundles, stalls) = collect(&mut driver, limits).await;

        for source in &sources {
            source.stop();
        }

        assert_eq!(driver.stats().stop_reason, Some(StopReason::MaxBundles));
        assert!(bundles.len() >= 5, "got {} bundles", bundles.len());
        assert!(stalls.is_empty());

        for pair in bundles.windows(2) {
            assert!(pair[0].sequence < pair[1].sequence);
        }
        for bundle in &bundles {
            assert_eq!(bundle.len(), 4);
            for frame in bundle.frames.values() {
                assert_eq!(frame.sequence, bundle.sequence);
            }
            match bundle.payload("depth") {
                Some(FramePayload::Image(image)) => assert_eq!(image.format, ImageFormat::Depth16),
                other => panic!("expected depth image, got {other:?}"),
            }
        }
    }

    /// A device that restarts its numbering keeps producing bundles
    #[tokio::test]
    async fn test_e2e_sequence_restart() {
        let sync = FrameSynchronizer::new(SyncConfig::new(["depth", "colorize"])).unwrap();
        let mut driver = SyncDriver::new(sync);
        let mut senders = Vec::new();
        for id in ["depth", "colorize"] {
            let (tx, rx) = channel_queue(id, QueueConfig::new(16, DropPolicy::DropNewest));
            driver.add_receiver(rx).unwrap();
            senders.push(tx);
        }

        for sequence in (100..104).chain(0..4) {
            for tx in &senders {
                let payload = FramePayload::Raw(Default::default());
                let frame = Frame::new(tx.channel().clone(), sequence, payload);
                tx.send(frame).unwrap();
            }
        }
        drop(senders);

        let limits = RunLimits::default().with_timeout(Duration::from_secs(5));
        let (bundles, _) = collect(&mut driver, limits).await;

        assert_eq!(driver.stats().stop_reason, Some(StopReason::AllClosed));
        let sequences: Vec<_> = bundles.iter().map(|b| b.sequence).collect();
        assert_eq!(sequences, vec![100, 101, 102, 103, 0, 1, 2, 3]);
        assert_eq!(driver.synchronizer().total_buffered(), 0);
        assert_eq!(driver.synchronizer().counters().frames_stale, 0);
    }

    /// A channel that drops every 4th frame costs exactly those bundles
    #[tokio::test]
    async fn test_e2e_dropped_device_frames() {
        let sync = FrameSynchronizer::new(SyncConfig::new(["depth", "colorize"])).unwrap();
        let mut driver = SyncDriver::new(sync);
        let mut sources = Vec::new();

        let mut depth = mock("depth", ChannelKind::Depth);
        depth.max_sequences = Some(12);
        let mut color = mock("colorize", ChannelKind::Color);
        color.max_sequences = Some(12);
        color.skip_every = 4;

        driver.add_receiver(start(depth, &mut sources)).unwrap();
        driver.add_receiver(start(color, &mut sources)).unwrap();

        let limits = RunLimits::default().with_timeout(Duration::from_secs(5));
        let (bundles, _) = collect(&mut driver, limits).await;

        assert_eq!(driver.stats().stop_reason, Some(StopReason::AllClosed));
        let sequences: Vec<_> = bundles.iter().map(|b| b.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 4, 5, 6, 8, 9, 10]);

        // depth 3 and 7 were pruned by the following bundle; 11 is left over
        let sync = driver.synchronizer();
        assert_eq!(sync.counters().frames_pruned, 2);
        assert_eq!(sync.buffered_len("depth"), 1);
        assert_eq!(sync.counters().frames_stale, 0);

        let mut aggregator = BundleMetricsAggregator::new();
        for bundle in &bundles {
            aggregator.update(bundle.sequence, &sync.counters(), 0);
        }
        assert_eq!(aggregator.summary().skipped_sequences, 2);
    }

    /// Streams starting at different sequence numbers meet in the middle
    #[tokio::test]
    async fn test_e2e_offset_streams() {
        let sync = FrameSynchronizer::new(SyncConfig::new(["depth", "colorize"])).unwrap();
        let mut driver = SyncDriver::new(sync);
        let mut sources = Vec::new();

        let mut depth = mock("depth", ChannelKind::Depth);
        depth.max_sequences = Some(10);
        let mut color = mock("colorize", ChannelKind::Color);
        color.max_sequences = Some(10);
        color.sequence_offset = 3;

        driver.add_receiver(start(depth, &mut sources)).unwrap();
        driver.add_receiver(start(color, &mut sources)).unwrap();

        let (bundles, _) = collect(
            &mut driver,
            RunLimits::default().with_timeout(Duration::from_secs(5)),
        )
        .await;

        let sequences: Vec<_> = bundles.iter().map(|b| b.sequence).collect();
        assert_eq!(sequences, (3..10).collect::<Vec<_>>());

        let sync = driver.synchronizer();
        assert_eq!(sync.counters().frames_pruned, 3);
        // colorize 10..=12 never find a partner
        assert_eq!(sync.buffered_len("colorize"), 3);
        assert_eq!(sync.buffered_len("depth"), 0);
    }

    /// A non-required stream is buffered but never gates completion
    #[tokio::test]
    async fn test_e2e_unlisted_stream_is_pruned() {
        let sync = FrameSynchronizer::new(SyncConfig::new(["depth", "colorize"])).unwrap();
        let mut driver = SyncDriver::new(sync);
        let mut sources = Vec::new();

        for (id, kind) in STREAMS.iter().take(3) {
            let mut config = mock(id, *kind);
            config.max_sequences = Some(20);
            driver.add_receiver(start(config, &mut sources)).unwrap();
        }

        let (bundles, _) = collect(
            &mut driver,
            RunLimits::default().with_timeout(Duration::from_secs(5)),
        )
        .await;

        assert_eq!(bundles.len(), 20);
        assert!(bundles.iter().all(|b| !b.contains("rectified_left")));
        // Everything below the last bundle was pruned
        let sync = driver.synchronizer();
        assert!(sync.buffered_len("rectified_left") <= 1);
    }

    /// Capped buffers report the silent required channel
    #[tokio::test]
    async fn test_e2e_stall_report() {
        let config = SyncConfig::new(["depth", "colorize"]).with_max_depth(4, DropPolicy::DropOldest);
        let sync = FrameSynchronizer::new(config).unwrap();
        let mut driver = SyncDriver::new(sync);
        let mut sources = Vec::new();

        let mut depth = mock("depth", ChannelKind::Depth);
        depth.max_sequences = Some(10);
        driver.add_receiver(start(depth, &mut sources)).unwrap();

        // colorize is declared but its source never starts
        let (_color_tx, color_rx) = channel_queue("colorize", QueueConfig::default());
        driver.add_receiver(color_rx).unwrap();

        let (bundles, stalls) = collect(
            &mut driver,
            RunLimits::default().with_timeout(Duration::from_millis(300)),
        )
        .await;

        assert!(bundles.is_empty());
        assert_eq!(driver.stats().stop_reason, Some(StopReason::Timeout));
        assert_eq!(stalls.len(), 1);
        assert_eq!(stalls[0].saturated, vec![ChannelId::new("depth")]);
        assert_eq!(stalls[0].lagging, vec![ChannelId::new("colorize")]);

        let sync = driver.synchronizer();
        assert_eq!(sync.buffered_len("depth"), 4);
        assert_eq!(sync.counters().frames_evicted, 6);
    }

    /// TOML config drives the whole chain
    #[tokio::test]
    async fn test_e2e_from_config() {
        let content = r#"
[device]
name = "test-camera"

[[channels]]
id = "depth"
kind = "depth"
frequency_hz = 400.0
width = 4
height = 4
queue_capacity = 64

[[channels]]
id = "rectified_right"
kind = "rectified_right"
frequency_hz = 400.0
width = 4
height = 4
queue_capacity = 64
"#;
        let blueprint = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        let sync = FrameSynchronizer::new(blueprint.to_sync_config()).unwrap();
        let mut driver = SyncDriver::new(sync);
        let mut sources = Vec::new();

        for channel in &blueprint.channels {
            let (tx, rx) = channel_queue(channel.id.clone(), QueueConfig::from(channel));
            let source = MockChannelSource::from_channel(channel).with_max_sequences(6);
            source.start(tx).unwrap();
            sources.push(source);
            driver.add_receiver(rx).unwrap();
        }

        let (bundles, _) = collect(
            &mut driver,
            RunLimits::default().with_timeout(Duration::from_secs(5)),
        )
        .await;

        assert_eq!(bundles.len(), 6);
        assert_eq!(
            bundles[0].channels(),
            vec![&ChannelId::new("depth"), &ChannelId::new("rectified_right")]
        );
        assert_eq!(driver.stats().stop_reason, Some(StopReason::AllClosed));
    }
}
