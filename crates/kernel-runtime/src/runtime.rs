//! # Kernel Runtime
//!
//! Wires the event bus and feature manager together and owns the startup and
//! shutdown sequences.
//!
//! ## Startup Sequence
//!
//! 1. Create the shared event bus
//! 2. Attach the lifecycle monitor (logs every kernel topic)
//! 3. Create the feature manager from the loaded configuration
//! 4. Register one [`ConfiguredFeature`] per configuration record
//! 5. `initialize()`: enabled features come up in dependency order
//!
//! ## Shutdown Sequence
//!
//! 1. `deinitialize()`: active features go down in reverse dependency order
//! 2. Log the final status report and metrics snapshot

use std::sync::Arc;

use feature_manager::{FeatureManager, ManagerStatus};
use kernel_bus::{topics, EventBus, ListenerId};
use kernel_telemetry::TelemetryError;
use kernel_types::{DynFeature, KernelConfig, KernelError};
use tracing::{debug, error, info, warn};

use crate::features::ConfiguredFeature;

/// Priority of the lifecycle monitor: ahead of application listeners.
const MONITOR_PRIORITY: i32 = 100;

/// The kernel runtime: one bus, one manager.
pub struct KernelRuntime {
    bus: Arc<EventBus>,
    manager: Arc<FeatureManager>,
    monitors: Vec<ListenerId>,
}

impl KernelRuntime {
    /// Create a runtime from configuration. No feature is registered yet.
    pub fn new(config: KernelConfig) -> Self {
        info!("Creating feature kernel runtime");

        let bus = Arc::new(EventBus::new());
        let monitors = attach_lifecycle_monitor(&bus);
        let manager = Arc::new(FeatureManager::new(Arc::clone(&bus), config));

        Self {
            bus,
            manager,
            monitors,
        }
    }

    /// Register one [`ConfiguredFeature`] per configuration record. Returns
    /// the number of features newly registered.
    pub fn register_configured_features(&self) -> usize {
        let config = self.manager.config();
        let mut registered = 0;
        for (id, record) in &config.features {
            if self.register(Arc::new(ConfiguredFeature::from_config(id.as_str(), record))) {
                debug!(feature_id = %id, enabled = record.enabled, "Configured feature registered");
                registered += 1;
            }
        }
        registered
    }

    /// Register an application-provided feature.
    pub fn register(&self, feature: DynFeature) -> bool {
        self.manager.register_feature(feature)
    }

    /// Bring up every enabled feature.
    pub async fn start(&self) -> Result<(), KernelError> {
        info!("===========================================");
        info!("  Feature Kernel Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.manager.initialize().await?;

        let status = self.manager.get_status();
        info!(
            active = status.active_features,
            total = status.total_features,
            errors = status.error_features,
            "Kernel started"
        );
        Ok(())
    }

    /// Tear down every active feature and log the final report.
    ///
    /// Also safe after a failed `start`: whatever came up is released.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        self.manager.deinitialize().await;

        match self.manager.export_report() {
            Ok(report) => debug!(report = %report, "Final kernel report"),
            Err(e) => warn!(error = %e, "Failed to export final report"),
        }
        match self.metrics_text() {
            Ok(metrics) => debug!(metrics = %metrics, "Final metrics"),
            Err(e) => warn!(error = %e, "Failed to gather metrics"),
        }
        info!("Shutdown complete");
    }

    /// Prometheus text exposition of the kernel metrics registry.
    pub fn metrics_text(&self) -> Result<String, TelemetryError> {
        kernel_telemetry::gather_metrics()
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> ManagerStatus {
        self.manager.get_status()
    }

    /// The shared event bus.
    #[must_use]
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// The feature manager.
    #[must_use]
    pub fn manager(&self) -> Arc<FeatureManager> {
        Arc::clone(&self.manager)
    }
}

impl Drop for KernelRuntime {
    fn drop(&mut self) {
        for (topic, id) in topics::LIFECYCLE_TOPICS.iter().zip(&self.monitors) {
            self.bus.remove_listener(topic, *id);
        }
    }
}

/// Log every kernel lifecycle event at a level matching its severity.
fn attach_lifecycle_monitor(bus: &EventBus) -> Vec<ListenerId> {
    topics::LIFECYCLE_TOPICS
        .iter()
        .map(|&topic| {
            bus.add_listener(
                topic,
                move |payload| {
                    let feature_id = payload.data["featureId"].as_str().unwrap_or("-");
                    match topic {
                        topics::FEATURE_ERROR => {
                            error!(topic, feature_id, data = %payload.data, "Lifecycle event")
                        }
                        topics::DEPENDENCY_MISSING => {
                            warn!(topic, feature_id, data = %payload.data, "Lifecycle event")
                        }
                        _ => debug!(topic, feature_id, "Lifecycle event"),
                    }
                    Ok(())
                },
                MONITOR_PRIORITY,
                false,
            )
        })
        .collect()
}
