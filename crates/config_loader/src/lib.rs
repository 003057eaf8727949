//! # Config Loader
//!
//! Loads the pipeline configuration.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate channel declarations and the sync policy
//! - Produce a `PipelineBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("Device: {}", blueprint.device.name);
//! ```

mod parser;
mod validator;

pub use contracts::PipelineBlueprint;
pub use parser::ConfigFormat;

use contracts::SyncError;
use std::path::Path;
use tracing::debug;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file path
    ///
    /// The format is detected from the extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<PipelineBlueprint, SyncError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        let blueprint = Self::load_from_str(&content, format)?;
        debug!(
            path = %path.display(),
            channels = blueprint.channels.len(),
            "config loaded"
        );
        Ok(blueprint)
    }

    /// Load configuration from a string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, SyncError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize to a TOML string
    pub fn to_toml(blueprint: &PipelineBlueprint) -> Result<String, SyncError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| SyncError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize to a JSON string
    pub fn to_json(blueprint: &PipelineBlueprint) -> Result<String, SyncError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| SyncError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    fn detect_format(path: &Path) -> Result<ConfigFormat, SyncError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            SyncError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| SyncError::config_parse(format!("unsupported config format: .{ext}")))
    }

    fn read_file(path: &Path) -> Result<String, SyncError> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, SyncError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}
