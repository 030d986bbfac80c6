//! # Kernel Telemetry
//!
//! Logging and metrics for the feature kernel.
//!
//! ## Components
//!
//! - **Logs**: `tracing` + `tracing-subscriber`, text or JSON
//! - **Metrics**: Prometheus counters and histograms for the bus and manager
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kernel_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_telemetry(&config).expect("Failed to init telemetry");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `KERNEL_SERVICE_NAME` | `feature-kernel` | Service name in logs |
//! | `KERNEL_LOG_LEVEL` | `info` | Log filter (falls back to `RUST_LOG`) |
//! | `KERNEL_JSON_LOGS` | `false` | JSON log lines |
//! | `KERNEL_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::{parse_flag, TelemetryConfig};
pub use logging::{env_filter, init_logging};
pub use metrics::{gather_metrics, register_metrics};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics, then install the global log subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)?;
    tracing::info!(service = %config.service_name, "Telemetry initialized");
    Ok(())
}
