//! Observability output: status snapshot and exportable report.

use kernel_bus::DispatchMetrics;
use kernel_types::{FeatureId, FeatureStatus, KernelConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One feature's row in the status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSnapshot {
    pub id: FeatureId,
    pub name: String,
    pub version: String,
    pub status: FeatureStatus,
    pub enabled: bool,
    /// Effective dependencies (configuration override applied).
    pub dependencies: Vec<FeatureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Point-in-time view of the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStatus {
    pub is_initialized: bool,
    pub strict_mode: bool,
    pub total_features: usize,
    pub active_features: usize,
    pub disabled_features: usize,
    pub error_features: usize,
    pub features: Vec<FeatureSnapshot>,
}

impl ManagerStatus {
    pub(crate) fn from_features(
        is_initialized: bool,
        strict_mode: bool,
        features: Vec<FeatureSnapshot>,
    ) -> Self {
        let count = |status: FeatureStatus| features.iter().filter(|f| f.status == status).count();

        Self {
            is_initialized,
            strict_mode,
            total_features: features.len(),
            active_features: count(FeatureStatus::Active),
            disabled_features: count(FeatureStatus::Disabled),
            error_features: count(FeatureStatus::Error),
            features,
        }
    }

    /// Row for `id`, if registered.
    #[must_use]
    pub fn feature(&self, id: &str) -> Option<&FeatureSnapshot> {
        self.features.iter().find(|f| f.id == id)
    }
}

/// Full exportable report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerReport {
    /// Milliseconds since the Unix epoch.
    pub generated_at: u64,
    pub status: ManagerStatus,
    pub config: KernelConfig,
    /// Per-topic dispatch latency summaries.
    pub event_metrics: BTreeMap<String, DispatchMetrics>,
    pub events_emitted: u64,
}
