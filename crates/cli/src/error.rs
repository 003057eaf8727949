//! Error types for CLI operations.

use contracts::SyncError;
use ingestion::IngestionError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or was rejected
    #[error("Invalid configuration: {0}")]
    Config(#[from] SyncError),

    /// Channel queue or source setup failed
    #[error("Ingestion setup failed: {0}")]
    Ingestion(#[from] IngestionError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
