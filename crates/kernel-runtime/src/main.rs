//! # Feature Kernel Runtime
//!
//! Loads configuration, brings up every enabled feature in dependency order,
//! runs until Ctrl+C, then tears everything down in reverse order.

use anyhow::{Context, Result};
use kernel_runtime::{load_config, KernelRuntime};
use kernel_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let config = load_config().context("Failed to load kernel configuration")?;

    let runtime = KernelRuntime::new(config);
    let registered = runtime.register_configured_features();
    info!(registered, "Configured features registered");

    if let Err(e) = runtime.start().await {
        runtime.shutdown().await;
        return Err(e).context("Failed to start feature kernel");
    }

    info!("Kernel is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    runtime.shutdown().await;
    Ok(())
}
