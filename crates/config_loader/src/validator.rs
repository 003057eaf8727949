//! Config validation
//!
//! Rules:
//! - at least one channel is declared
//! - channel ids are non-empty and unique
//! - frequency_hz > 0 with a finite period, queue_capacity > 0
//! - required channels are declared, non-empty and unique
//! - sync.buffer.max_depth > 0 when set

use std::collections::HashSet;

use contracts::{PipelineBlueprint, SyncError};

/// Validate a PipelineBlueprint
///
/// Returns the first error encountered.
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), SyncError> {
    validate_channel_ids(blueprint)?;
    validate_channel_rates(blueprint)?;
    validate_required_channels(blueprint)?;
    validate_buffer(blueprint)?;
    Ok(())
}

fn validate_channel_ids(blueprint: &PipelineBlueprint) -> Result<(), SyncError> {
    if blueprint.channels.is_empty() {
        return Err(SyncError::config_validation(
            "channels",
            "at least one channel must be declared",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, channel) in blueprint.channels.iter().enumerate() {
        if channel.id.is_empty() {
            return Err(SyncError::config_validation(
                format!("channels[{idx}].id"),
                "channel id cannot be empty",
            ));
        }
        if !seen.insert(&channel.id) {
            return Err(SyncError::config_validation(
                format!("channels[id={}]", channel.id),
                "duplicate channel id",
            ));
        }
    }
    Ok(())
}

fn validate_channel_rates(blueprint: &PipelineBlueprint) -> Result<(), SyncError> {
    for channel in &blueprint.channels {
        let frequency = channel.frequency_hz;
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(SyncError::config_validation(
                format!("channels[{}].frequency_hz", channel.id),
                format!("frequency_hz must be > 0, got {frequency}"),
            ));
        }
        // Subnormal rates pass the check above but have no finite period
        if !(1.0 / frequency).is_finite() {
            return Err(SyncError::config_validation(
                format!("channels[{}].frequency_hz", channel.id),
                format!("frequency_hz {frequency} is too small"),
            ));
        }
        if channel.queue_capacity == 0 {
            return Err(SyncError::config_validation(
                format!("channels[{}].queue_capacity", channel.id),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}

/// An empty list means "every declared channel" and is always valid
fn validate_required_channels(blueprint: &PipelineBlueprint) -> Result<(), SyncError> {
    let declared: HashSet<_> = blueprint.channels.iter().map(|c| c.id.as_str()).collect();

    let mut seen = HashSet::new();
    for id in &blueprint.sync.required_channels {
        if id.is_empty() {
            return Err(SyncError::config_validation(
                "sync.required_channels",
                "channel name cannot be empty",
            ));
        }
        if !seen.insert(id.as_str()) {
            return Err(SyncError::config_validation(
                "sync.required_channels",
                format!("channel '{id}' listed more than once"),
            ));
        }
        if !declared.contains(id.as_str()) {
            return Err(SyncError::config_validation(
                "sync.required_channels",
                format!("channel '{id}' is not declared in channels"),
            ));
        }
    }
    Ok(())
}

fn validate_buffer(blueprint: &PipelineBlueprint) -> Result<(), SyncError> {
    if blueprint.sync.buffer.max_depth == Some(0) {
        return Err(SyncError::config_validation(
            "sync.buffer.max_depth",
            "max_depth must be > 0 when set",
        ));
    }
    Ok(())
}
