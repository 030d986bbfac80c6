//! Structured logging setup.
//!
//! Installs a global `tracing-subscriber` with an `EnvFilter` built from
//! `TelemetryConfig::log_level`, writing either human-readable lines or JSON
//! objects with consistent fields (`timestamp`, `level`, `target`, `fields`).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{TelemetryConfig, TelemetryError};

/// Build the level filter from the configured directive.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("invalid log filter {:?}: {e}", config.log_level)))
}

/// Install the global subscriber.
///
/// Fails if the filter directive does not parse or a global subscriber is
/// already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;

    let console = config.console_output.then(|| {
        if config.json_logs {
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .boxed()
        } else {
            fmt::layer().with_target(true).with_thread_ids(true).boxed()
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging initialized"
    );

    Ok(())
}

/// Log a feature lifecycle event with standard fields.
#[macro_export]
macro_rules! log_feature_event {
    ($level:ident, $feature_id:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            feature_id = %$feature_id,
            $($($field)*,)?
            $msg
        )
    };
}
