//! # Kernel Configuration
//!
//! Configuration records produced by an external loader (usually the app's
//! `app-config.json`) and consumed by the feature manager.
//!
//! ```json
//! {
//!   "autoInitialize": true,
//!   "strictMode": false,
//!   "features": {
//!     "networkMonitor": { "enabled": true, "config": { "interval": 5000 } },
//!     "offlineSync": { "enabled": true, "dependencies": ["networkMonitor"] }
//!   }
//! }
//! ```

use crate::feature::FeatureId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-feature configuration record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureConfig {
    /// Whether the feature takes part in batch initialization.
    #[serde(default)]
    pub enabled: bool,
    /// Opaque, feature-owned configuration.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Replaces the feature's declared dependencies when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<FeatureId>>,
}

impl FeatureConfig {
    /// An enabled record with no config and no override.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// A disabled record.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Attach feature-owned configuration.
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Override the feature's declared dependencies.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FeatureId>,
    {
        self.dependencies = Some(deps.into_iter().map(Into::into).collect());
        self
    }
}

/// Manager-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelConfig {
    /// Run `initialize_enabled_features` from the top-level `initialize`.
    #[serde(default = "default_auto_initialize")]
    pub auto_initialize: bool,
    /// Abort a batch on the first fatal error instead of continuing.
    #[serde(default)]
    pub strict_mode: bool,
    /// Feature id → configuration record.
    #[serde(default)]
    pub features: BTreeMap<FeatureId, FeatureConfig>,
}

fn default_auto_initialize() -> bool {
    true
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            auto_initialize: true,
            strict_mode: false,
            features: BTreeMap::new(),
        }
    }
}

impl KernelConfig {
    /// Lenient configuration with no feature records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode.
    #[must_use]
    pub fn strict(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    /// Set the auto-initialize flag.
    #[must_use]
    pub fn auto_initialize(mut self, auto_initialize: bool) -> Self {
        self.auto_initialize = auto_initialize;
        self
    }

    /// Add or replace one feature record.
    #[must_use]
    pub fn with_feature(mut self, id: impl Into<FeatureId>, config: FeatureConfig) -> Self {
        self.features.insert(id.into(), config);
        self
    }

    /// Whether `id` has a record with `enabled = true`.
    #[must_use]
    pub fn is_enabled(&self, id: &str) -> bool {
        self.features.get(id).is_some_and(|c| c.enabled)
    }

    /// Parse from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
