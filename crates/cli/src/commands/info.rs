//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{ArrivalPolicy, DropPolicy, PipelineBlueprint, UnlistedChannelPolicy};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    device: String,
    channels: Vec<ChannelInfo>,
    sync_settings: SyncInfo,
}

#[derive(Serialize)]
struct ChannelInfo {
    id: String,
    kind: String,
    format: String,
    frequency_hz: f64,
    width: u32,
    height: u32,
    frame_bytes: usize,
    queue_capacity: usize,
    queue_policy: DropPolicy,
    required: bool,
}

#[derive(Serialize)]
struct SyncInfo {
    required_channels: Vec<String>,
    unlisted_channels: UnlistedChannelPolicy,
    arrival: ArrivalPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_depth: Option<usize>,
    overflow: DropPolicy,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &PipelineBlueprint) -> ConfigInfo {
    let required = blueprint.required_channels();

    let channels = blueprint
        .channels
        .iter()
        .map(|c| {
            let format = c.kind.image_format();
            ChannelInfo {
                id: c.id.to_string(),
                kind: format!("{:?}", c.kind),
                format: format!("{:?}", format),
                frequency_hz: c.frequency_hz,
                width: c.width,
                height: c.height,
                frame_bytes: c.width as usize * c.height as usize * format.bytes_per_pixel(),
                queue_capacity: c.queue_capacity,
                queue_policy: c.queue_policy,
                required: required.contains(&c.id),
            }
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        device: blueprint.device.name.clone(),
        channels,
        sync_settings: SyncInfo {
            required_channels: required.iter().map(|c| c.to_string()).collect(),
            unlisted_channels: blueprint.sync.unlisted_channels,
            arrival: blueprint.sync.arrival,
            max_depth: blueprint.sync.buffer.max_depth,
            overflow: blueprint.sync.buffer.overflow,
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               depth-sync Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📷 Device");
    println!("   ├─ Version: {}", info.version);
    println!("   └─ Name: {}", info.device);

    println!("\n🎞️  Channels ({})", info.channels.len());
    for (i, channel) in info.channels.iter().enumerate() {
        let is_last = i == info.channels.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };
        let marker = if channel.required { "" } else { " [not required]" };

        println!("   {} {} ({}){}", prefix, channel.id, channel.kind, marker);
        println!(
            "   {}  ├─ {}x{} {} @ {} Hz ({} bytes/frame)",
            child_prefix,
            channel.width,
            channel.height,
            channel.format,
            channel.frequency_hz,
            channel.frame_bytes
        );
        println!(
            "   {}  └─ queue: {} slot(s), {:?}",
            child_prefix, channel.queue_capacity, channel.queue_policy
        );
    }

    let sync = &info.sync_settings;
    println!("\n⚙️  Sync Settings");
    println!("   ├─ Required: {}", sync.required_channels.join(", "));
    println!("   ├─ Unlisted channels: {:?}", sync.unlisted_channels);
    println!("   ├─ Arrivals: {:?}", sync.arrival);
    match sync.max_depth {
        Some(max) => println!("   └─ Max depth: {} ({:?})", max, sync.overflow),
        None => println!("   └─ Max depth: unbounded"),
    }

    println!();
}
