//! # Configured Features
//!
//! A generic feature built from one `app-config.json` record, so a deployment
//! can stand up its feature graph from configuration alone. The record's
//! `config` object may carry `name` and `version`; everything else is kept as
//! the feature's settings and validated on `initialize()`.

use async_trait::async_trait;
use kernel_types::{
    Feature, FeatureConfig, FeatureError, FeatureErrorKind, FeatureId, FeatureInfo,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

/// Feature whose metadata and settings come from configuration.
pub struct ConfiguredFeature {
    info: FeatureInfo,
    settings: Value,
    /// Settings captured by the last successful `initialize()`.
    applied: RwLock<Option<Value>>,
}

impl ConfiguredFeature {
    /// Build the feature registered as `id` from its configuration record.
    pub fn from_config(id: impl Into<FeatureId>, record: &FeatureConfig) -> Self {
        let id = id.into();
        let name = record
            .config
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&id)
            .to_string();
        let version = record
            .config
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("1.0.0")
            .to_string();

        let info = FeatureInfo::new(id, name)
            .with_version(version)
            .depends_on(record.dependencies.clone().unwrap_or_default());

        Self {
            info,
            settings: record.config.clone(),
            applied: RwLock::new(None),
        }
    }

    /// Whether `initialize()` has succeeded and `deinitialize()` has not run
    /// since.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.applied.read().is_some()
    }
}

#[async_trait]
impl Feature for ConfiguredFeature {
    fn id(&self) -> &str {
        &self.info.id
    }

    fn name(&self) -> &str {
        &self.info.name
    }

    fn version(&self) -> &str {
        &self.info.version
    }

    fn dependencies(&self) -> Vec<FeatureId> {
        self.info.dependencies.clone()
    }

    fn config(&self) -> Value {
        self.settings.clone()
    }

    async fn initialize(&self) -> Result<(), FeatureError> {
        if !(self.settings.is_object() || self.settings.is_null()) {
            return Err(FeatureError::new(
                &self.info.id,
                FeatureErrorKind::ConfigurationError,
                format!("settings must be an object, got {}", self.settings),
            ));
        }

        *self.applied.write() = Some(self.settings.clone());
        info!(feature_id = %self.info.id, "Configured feature started");
        Ok(())
    }

    async fn deinitialize(&self) -> Result<(), FeatureError> {
        if self.applied.write().take().is_none() {
            debug!(feature_id = %self.info.id, "Configured feature was not running");
        }
        info!(feature_id = %self.info.id, "Configured feature stopped");
        Ok(())
    }
}
