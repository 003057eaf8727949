//! # Observability
//!
//! Tracing setup and Prometheus metrics.
//!
//! - Tracing initialization (JSON / Pretty / Compact)
//! - Prometheus exporter
//! - Bundle metrics recording and aggregation
//!
//! ## Example
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig::default())?;
//!
//! if let Some(bundle) = synchronizer.push(frame) {
//!     observability::record_bundle_metrics(&bundle, synchronizer.total_buffered());
//! }
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use crate::metrics::{
    BundleMetricsAggregator, MetricsSummary, RunningStats, StatsSummary, record_buffer_depth,
    record_bundle_metrics, record_stall, record_sync_counters,
};

/// Initialize with defaults (JSON logs, metrics on port 9000)
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Filter used when `RUST_LOG` is unset or ignored
    pub default_log_level: String,
    /// Let `RUST_LOG` override `default_log_level`
    pub use_env_filter: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
            use_env_filter: true,
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON
    #[default]
    Json,
    /// Human-readable multi-line
    Pretty,
    /// Single line
    Compact,
}

impl ObservabilityConfig {
    fn env_filter(&self) -> EnvFilter {
        if self.use_env_filter {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&self.default_log_level))
        } else {
            EnvFilter::new(&self.default_log_level)
        }
    }
}

/// Initialize with a custom configuration
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Install only the Prometheus exporter
///
/// For when tracing was set up elsewhere.
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
