//! `validate` command implementation.

use std::collections::HashSet;

use anyhow::{Context, Result};
use contracts::{DropPolicy, PipelineBlueprint, UnlistedChannelPolicy};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    device: String,
    channel_count: usize,
    required_channels: Vec<String>,
    max_depth: Option<usize>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            error: Some(format!("File not found: {config_path}")),
            config_path,
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                device: blueprint.device.name.clone(),
                channel_count: blueprint.channels.len(),
                required_channels: blueprint
                    .required_channels()
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                max_depth: blueprint.sync.buffer.max_depth,
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let sync = &blueprint.sync;

    if sync.buffer.max_depth.is_none() {
        warnings.push(
            "sync.buffer.max_depth is unset - buffers grow without bound while a required \
             channel is silent"
                .to_string(),
        );
    }

    let required: HashSet<_> = blueprint.required_channels().into_iter().collect();
    if sync.unlisted_channels == UnlistedChannelPolicy::Buffer {
        for channel in blueprint.channels.iter().filter(|c| !required.contains(&c.id)) {
            warnings.push(format!(
                "Channel '{}' is not required - its frames are buffered until a bundle prunes them",
                channel.id
            ));
        }
    }

    let mut rates: Vec<f64> = blueprint
        .channels
        .iter()
        .filter(|c| required.contains(&c.id))
        .map(|c| c.frequency_hz)
        .collect();
    rates.sort_by(f64::total_cmp);
    if let (Some(min), Some(max)) = (rates.first(), rates.last()) {
        if max > min {
            warnings.push(format!(
                "Required channels run at different rates ({min} to {max} Hz) - bundles follow the slowest"
            ));
        }
    }

    for channel in &blueprint.channels {
        if channel.queue_capacity == 1 && channel.queue_policy == DropPolicy::DropNewest {
            warnings.push(format!(
                "Channel '{}' has a single-slot queue with drop_newest - the queued frame goes stale",
                channel.id
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Device: {}", summary.device);
            println!("  Channels: {}", summary.channel_count);
            println!("  Required: {}", summary.required_channels.join(", "));
            match summary.max_depth {
                Some(max) => println!("  Max depth: {max}"),
                None => println!("  Max depth: unbounded"),
            }
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
