//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};
use contracts::PipelineBlueprint;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        device = %blueprint.device.name,
        channels = blueprint.channels.len(),
        required = blueprint.required_channels().len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if let Some(port) = args.metrics_port {
        observability::init_metrics_only(port)?;
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        max_bundles: (args.max_bundles > 0).then_some(args.max_bundles),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        max_sequences: None,
    };

    info!("Starting pipeline...");
    let stats = Pipeline::new(pipeline_config)
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        bundles = stats.bundles,
        frames = stats.frames_received,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline finished"
    );
    stats.print_summary();

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Device: {}", blueprint.device.name);
    println!("\nChannels ({}):", blueprint.channels.len());
    for channel in &blueprint.channels {
        println!(
            "  - {} ({:?}, {} Hz, {}x{})",
            channel.id, channel.kind, channel.frequency_hz, channel.width, channel.height
        );
    }

    let sync = blueprint.to_sync_config();
    println!("\nSync Settings:");
    println!(
        "  Required: {}",
        sync.required_channels
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    match sync.buffer.max_depth {
        Some(max) => println!("  Max depth: {} ({:?})", max, sync.buffer.overflow),
        None => println!("  Max depth: unbounded"),
    }
    println!();
}
