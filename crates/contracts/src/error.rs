//! Layered error definitions
//!
//! Categorized by source: config / io

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum SyncError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = SyncError::config_validation("sync.required_channels", "must not be empty");
        assert_eq!(
            err.to_string(),
            "config validation error at 'sync.required_channels': must not be empty"
        );
    }
}
