//! # Feature Manager - Registry and Lifecycle Driver
//!
//! Owns the feature registry, resolves dependency order, and drives each
//! feature through its state machine under a strict or lenient policy.
//!
//! ## Batch Policies
//!
//! - **Strict**: the first missing dependency or failed `initialize()` aborts
//!   the batch; later features stay `Disabled`.
//! - **Lenient**: failures are logged, dependents of a failed feature are
//!   skipped by their own dependency check, the batch carries on.
//! - **Cycles**: detected before any `initialize()` runs and abort the whole
//!   batch in either mode.
//! - **Teardown**: always best-effort, in reverse dependency order.
//!
//! ## Locking
//!
//! Registry and configuration sit behind `parking_lot` locks that are never
//! held across an `.await` or while the bus runs listeners. Feature handles
//! are cloned out of the registry before their lifecycle hooks are awaited.

use crate::resolver::topological_order;
use crate::snapshot::{FeatureSnapshot, ManagerReport, ManagerStatus};
use kernel_bus::{topics, EventBus};
use kernel_telemetry::{log_feature_event, metrics as telemetry};
use kernel_types::{
    current_timestamp_ms, DynFeature, EventPayload, FeatureConfig, FeatureError, FeatureId,
    FeatureInfo, FeatureStatus, KernelConfig, KernelError,
};
use parking_lot::RwLock;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// `source` of every event the manager emits.
pub const MANAGER_SOURCE: &str = "feature-manager";

/// Mutable part of a registry entry.
#[derive(Debug, Default)]
struct EntryState {
    status: FeatureStatus,
    last_error: Option<String>,
}

/// A registered feature.
struct FeatureEntry {
    feature: DynFeature,
    info: FeatureInfo,
    state: RwLock<EntryState>,
}

impl FeatureEntry {
    fn status(&self) -> FeatureStatus {
        self.state.read().status
    }
}

/// Registry and lifecycle driver for pluggable features.
pub struct FeatureManager {
    /// Registered features by id.
    registry: RwLock<BTreeMap<FeatureId, Arc<FeatureEntry>>>,
    /// Manager-wide and per-feature configuration.
    config: RwLock<KernelConfig>,
    /// Bus lifecycle events are published on.
    bus: Arc<EventBus>,
    /// Serializes top-level `initialize` / `deinitialize`.
    batch: tokio::sync::Mutex<()>,
    /// Set once a top-level `initialize` has completed.
    initialized: AtomicBool,
}

impl FeatureManager {
    /// Create a manager publishing on `bus`.
    pub fn new(bus: Arc<EventBus>, config: KernelConfig) -> Self {
        info!(
            strict_mode = config.strict_mode,
            auto_initialize = config.auto_initialize,
            configured = config.features.len(),
            "[FeatureManager] Created"
        );

        Self {
            registry: RwLock::new(BTreeMap::new()),
            config: RwLock::new(config),
            bus,
            batch: tokio::sync::Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    /// The bus lifecycle events are published on.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Register a feature.
    ///
    /// A duplicate id is logged and ignored: the first registration wins and
    /// `false` is returned.
    pub fn register_feature(&self, feature: DynFeature) -> bool {
        let info = feature.info();
        let id = info.id.clone();

        {
            let mut registry = self.registry.write();
            if registry.contains_key(&id) {
                warn!(feature_id = %id, "[FeatureManager] Feature already registered, ignoring");
                return false;
            }
            registry.insert(
                id.clone(),
                Arc::new(FeatureEntry {
                    feature,
                    info: info.clone(),
                    state: RwLock::new(EntryState::default()),
                }),
            );
        }

        log_feature_event!(info, id, "[FeatureManager] Feature registered", name = %info.name);
        self.publish(
            topics::FEATURE_REGISTERED,
            json!({ "featureId": id, "name": info.name, "version": info.version }),
        );
        true
    }

    /// Register a feature together with its configuration record.
    pub fn register_feature_with_config(&self, feature: DynFeature, config: FeatureConfig) -> bool {
        let id = feature.id().to_string();
        let registered = self.register_feature(feature);
        if registered {
            self.update_feature_config(&id, config);
        }
        registered
    }

    /// Remove a feature, deinitializing it first if it is `Active`.
    ///
    /// A failing deinitialize is logged; the feature is removed regardless.
    pub async fn unregister_feature(&self, id: &str) -> Result<(), KernelError> {
        let entry = self.entry(id)?;

        if entry.status() == FeatureStatus::Active {
            if let Err(e) = self.deinitialize_feature(id).await {
                error!(feature_id = %id, error = %e, "[FeatureManager] Deinitialize before unregister failed");
            }
        }

        self.registry.write().remove(id);
        log_feature_event!(info, id, "[FeatureManager] Feature unregistered");
        self.publish(topics::FEATURE_UNREGISTERED, json!({ "featureId": id }));
        Ok(())
    }

    // =========================================================================
    // TOP-LEVEL LIFECYCLE
    // =========================================================================

    /// Initialize the manager: with `auto_initialize`, bring up every enabled
    /// feature in dependency order.
    ///
    /// A second call, or a call racing an in-flight batch, is a logged no-op.
    pub async fn initialize(&self) -> Result<(), KernelError> {
        let Ok(_batch) = self.batch.try_lock() else {
            warn!("[FeatureManager] Batch already in flight, ignoring initialize");
            return Ok(());
        };
        if self.is_initialized() {
            warn!("[FeatureManager] Already initialized");
            return Ok(());
        }

        let auto_initialize = self.config.read().auto_initialize;
        if auto_initialize {
            self.initialize_enabled_features().await?;
        }

        self.initialized.store(true, Ordering::Release);
        let status = self.get_status();
        info!(
            active = status.active_features,
            total = status.total_features,
            errors = status.error_features,
            "[FeatureManager] Initialized"
        );
        Ok(())
    }

    /// Tear down every active feature and clear the initialized flag.
    ///
    /// Runs even when `initialize` never completed, so features brought up
    /// before a failed strict batch are still released.
    pub async fn deinitialize(&self) {
        let Ok(_batch) = self.batch.try_lock() else {
            warn!("[FeatureManager] Batch already in flight, ignoring deinitialize");
            return;
        };
        if !self.is_initialized() {
            debug!("[FeatureManager] Not initialized, releasing partially started features");
        }

        self.deinitialize_all_features().await;
        self.initialized.store(false, Ordering::Release);
        info!("[FeatureManager] Deinitialized");
    }

    /// Whether a top-level `initialize` has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    // =========================================================================
    // BATCHES
    // =========================================================================

    /// Initialize every enabled feature in dependency order.
    ///
    /// # Errors
    ///
    /// - `CircularDependency` in any mode, before any feature is touched.
    /// - Strict mode: the first per-feature failure.
    pub async fn initialize_enabled_features(&self) -> Result<(), KernelError> {
        let enabled: Vec<FeatureId> = {
            let config = self.config.read();
            self.registry
                .read()
                .keys()
                .filter(|id| config.is_enabled(id))
                .cloned()
                .collect()
        };

        let order = self.sort_by_dependencies(&enabled)?;
        info!(order = ?order, "[FeatureManager] Initializing enabled features");

        let strict = self.strict_mode();
        for id in &order {
            match self.initialize_feature(id).await {
                Ok(()) => {}
                Err(e) if strict => {
                    error!(feature_id = %id, error = %e, "[FeatureManager] ✗ Aborting batch (strict mode)");
                    return Err(e);
                }
                Err(e) => {
                    warn!(feature_id = %id, error = %e, "[FeatureManager] ✗ Feature failed, continuing");
                }
            }
        }

        Ok(())
    }

    /// Deinitialize every active feature in reverse dependency order.
    /// Best-effort: failures are logged and never stop the loop.
    pub async fn deinitialize_all_features(&self) {
        let active = self.get_active_features();

        let order = match self.sort_by_dependencies(&active) {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "[FeatureManager] Active set is cyclic, tearing down in registry order");
                active
            }
        };

        info!(count = order.len(), "[FeatureManager] Deinitializing active features");
        for id in order.iter().rev() {
            if let Err(e) = self.deinitialize_feature(id).await {
                error!(feature_id = %id, error = %e, "[FeatureManager] ✗ Teardown failed, continuing");
            }
        }
    }

    // =========================================================================
    // SINGLE-FEATURE LIFECYCLE
    // =========================================================================

    /// Drive one feature to `Active`.
    ///
    /// No-op if already `Active`. With dependencies not `Active`: strict mode
    /// fails with `MissingDependency`, lenient mode skips the feature and
    /// returns `Ok` with the feature left as it was.
    pub async fn initialize_feature(&self, id: &str) -> Result<(), KernelError> {
        let entry = self.entry(id)?;

        let current = entry.status();
        if current == FeatureStatus::Active {
            debug!(feature_id = %id, "[FeatureManager] Already active");
            return Ok(());
        }
        if current.is_transitioning() {
            return Err(KernelError::TransitionInProgress {
                feature_id: id.to_string(),
                status: current,
            });
        }

        let missing = self.check_dependencies(id)?;
        if !missing.is_empty() {
            telemetry::record_failure("dependency");
            self.publish(
                topics::DEPENDENCY_MISSING,
                json!({ "featureId": id, "missing": missing }),
            );

            if self.strict_mode() {
                error!(feature_id = %id, missing = ?missing, "[FeatureManager] Missing dependencies");
                return Err(KernelError::MissingDependency {
                    feature_id: id.to_string(),
                    missing,
                });
            }
            warn!(feature_id = %id, missing = ?missing, "[FeatureManager] Missing dependencies, skipping");
            return Ok(());
        }

        self.transition(&entry, FeatureStatus::Initializing)?;
        log_feature_event!(info, id, "[FeatureManager] Initializing", name = %entry.info.name);

        match entry.feature.initialize().await {
            Ok(()) => {
                self.transition(&entry, FeatureStatus::Active)?;
                log_feature_event!(info, id, "[FeatureManager] ✓ Active");
                self.publish(
                    topics::FEATURE_INITIALIZED,
                    json!({ "featureId": id, "name": entry.info.name }),
                );
                Ok(())
            }
            Err(source) => {
                self.fail(&entry, "initialize", &source)?;
                Err(KernelError::Initialization {
                    feature_id: id.to_string(),
                    source,
                })
            }
        }
    }

    /// Drive one feature from `Active` back to `Disabled`. No-op unless
    /// `Active`.
    pub async fn deinitialize_feature(&self, id: &str) -> Result<(), KernelError> {
        let entry = self.entry(id)?;

        let current = entry.status();
        if current != FeatureStatus::Active {
            debug!(feature_id = %id, status = %current, "[FeatureManager] Not active, nothing to deinitialize");
            return Ok(());
        }

        let dependents: Vec<FeatureId> = self
            .get_dependents(id)
            .into_iter()
            .filter(|d| self.feature_status(d) == Some(FeatureStatus::Active))
            .collect();
        if !dependents.is_empty() {
            warn!(feature_id = %id, dependents = ?dependents, "[FeatureManager] Deinitializing while dependents are active");
        }

        self.transition(&entry, FeatureStatus::Deinitializing)?;
        log_feature_event!(info, id, "[FeatureManager] Deinitializing");

        match entry.feature.deinitialize().await {
            Ok(()) => {
                self.transition(&entry, FeatureStatus::Disabled)?;
                log_feature_event!(info, id, "[FeatureManager] ✓ Disabled");
                self.publish(
                    topics::FEATURE_DEINITIALIZED,
                    json!({ "featureId": id, "name": entry.info.name }),
                );
                Ok(())
            }
            Err(source) => {
                self.fail(&entry, "deinitialize", &source)?;
                Err(KernelError::Deinitialization {
                    feature_id: id.to_string(),
                    source,
                })
            }
        }
    }

    /// Move `entry` to `next`, checking the state machine, and publish the
    /// change. The entry lock is released before publishing.
    fn transition(&self, entry: &FeatureEntry, next: FeatureStatus) -> Result<(), KernelError> {
        let previous = {
            let mut state = entry.state.write();
            let previous = state.status;
            if !previous.can_transition_to(next) {
                return Err(KernelError::TransitionInProgress {
                    feature_id: entry.info.id.clone(),
                    status: previous,
                });
            }
            state.status = next;
            if next == FeatureStatus::Active {
                state.last_error = None;
            }
            previous
        };

        telemetry::record_transition(next.as_str());
        self.publish(
            topics::FEATURE_STATUS_CHANGED,
            json!({ "featureId": entry.info.id, "previous": previous, "status": next }),
        );
        Ok(())
    }

    /// Record a failed lifecycle hook: remember the error, move to `Error`,
    /// publish `FEATURE_ERROR`.
    fn fail(&self, entry: &FeatureEntry, phase: &str, source: &FeatureError) -> Result<(), KernelError> {
        entry.state.write().last_error = Some(source.to_string());
        self.transition(entry, FeatureStatus::Error)?;

        telemetry::record_failure(phase);
        log_feature_event!(error, entry.info.id, "[FeatureManager] ✗ Lifecycle hook failed", phase = phase, error = %source);
        self.publish(
            topics::FEATURE_ERROR,
            json!({ "featureId": entry.info.id, "phase": phase, "error": source }),
        );
        Ok(())
    }

    // =========================================================================
    // DEPENDENCY RESOLUTION
    // =========================================================================

    /// Dependencies of `id` that are not currently `Active`, unregistered ones
    /// included, in declaration order.
    pub fn check_dependencies(&self, id: &str) -> Result<Vec<FeatureId>, KernelError> {
        let deps = self.effective_dependencies(id)?;
        let registry = self.registry.read();

        Ok(deps
            .into_iter()
            .filter(|dep| {
                registry
                    .get(dep)
                    .map_or(true, |e| e.status() != FeatureStatus::Active)
            })
            .collect())
    }

    /// Order `ids` so every feature follows its in-set dependencies.
    /// Dependencies outside `ids` are ignored.
    pub fn sort_by_dependencies(&self, ids: &[FeatureId]) -> Result<Vec<FeatureId>, KernelError> {
        let edges: HashMap<FeatureId, Vec<FeatureId>> = ids
            .iter()
            .filter_map(|id| {
                self.effective_dependencies(id)
                    .ok()
                    .map(|deps| (id.clone(), deps))
            })
            .collect();

        topological_order(ids, &edges).inspect_err(|e| {
            telemetry::record_failure("cycle");
            error!(error = %e, "[FeatureManager] Dependency cycle, batch aborted");
        })
    }

    /// The configuration override if present, else the declared dependencies.
    pub fn effective_dependencies(&self, id: &str) -> Result<Vec<FeatureId>, KernelError> {
        if let Some(deps) = self
            .config
            .read()
            .features
            .get(id)
            .and_then(|c| c.dependencies.clone())
        {
            return Ok(deps);
        }
        Ok(self.entry(id)?.info.dependencies.clone())
    }

    /// Registered features whose effective dependencies include `id`.
    #[must_use]
    pub fn get_dependents(&self, id: &str) -> Vec<FeatureId> {
        self.registered_ids()
            .into_iter()
            .filter(|other| {
                self.effective_dependencies(other)
                    .is_ok_and(|deps| deps.iter().any(|d| d == id))
            })
            .collect()
    }

    // =========================================================================
    // CONFIGURATION
    // =========================================================================

    /// Current strict-mode policy.
    #[must_use]
    pub fn strict_mode(&self) -> bool {
        self.config.read().strict_mode
    }

    /// Switch the failure policy for subsequent batches.
    pub fn set_strict_mode(&self, strict_mode: bool) {
        self.config.write().strict_mode = strict_mode;
        info!(strict_mode, "[FeatureManager] Strict mode updated");
    }

    /// Replace the configuration record of `id`. The feature need not be
    /// registered yet.
    pub fn update_feature_config(&self, id: &str, config: FeatureConfig) {
        self.config.write().features.insert(id.to_string(), config);
        debug!(feature_id = %id, "[FeatureManager] Feature config updated");
    }

    /// Configuration record of `id`, if any.
    #[must_use]
    pub fn feature_config(&self, id: &str) -> Option<FeatureConfig> {
        self.config.read().features.get(id).cloned()
    }

    /// Whether `id` is enabled in configuration.
    #[must_use]
    pub fn is_feature_enabled(&self, id: &str) -> bool {
        self.config.read().is_enabled(id)
    }

    /// Mark `id` enabled; if the manager is initialized, bring it up now.
    pub async fn enable_feature(&self, id: &str) -> Result<(), KernelError> {
        self.entry(id)?;
        self.config
            .write()
            .features
            .entry(id.to_string())
            .or_default()
            .enabled = true;

        if self.is_initialized() {
            self.initialize_feature(id).await?;
        }
        Ok(())
    }

    /// Mark `id` disabled and deinitialize it if active.
    pub async fn disable_feature(&self, id: &str) -> Result<(), KernelError> {
        self.entry(id)?;
        if let Some(config) = self.config.write().features.get_mut(id) {
            config.enabled = false;
        }
        self.deinitialize_feature(id).await
    }

    /// Copy of the current configuration.
    #[must_use]
    pub fn config(&self) -> KernelConfig {
        self.config.read().clone()
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Whether `id` is registered.
    #[must_use]
    pub fn is_registered(&self, id: &str) -> bool {
        self.registry.read().contains_key(id)
    }

    /// All registered ids, sorted.
    #[must_use]
    pub fn registered_ids(&self) -> Vec<FeatureId> {
        self.registry.read().keys().cloned().collect()
    }

    /// Status of `id`, if registered.
    #[must_use]
    pub fn feature_status(&self, id: &str) -> Option<FeatureStatus> {
        self.registry.read().get(id).map(|e| e.status())
    }

    /// Metadata of `id`, if registered.
    #[must_use]
    pub fn feature_info(&self, id: &str) -> Option<FeatureInfo> {
        self.registry.read().get(id).map(|e| e.info.clone())
    }

    /// Handle to the feature registered as `id`.
    #[must_use]
    pub fn get_feature(&self, id: &str) -> Option<DynFeature> {
        self.registry.read().get(id).map(|e| Arc::clone(&e.feature))
    }

    /// Message of the last failed lifecycle hook of `id`.
    #[must_use]
    pub fn last_error(&self, id: &str) -> Option<String> {
        self.registry
            .read()
            .get(id)
            .and_then(|e| e.state.read().last_error.clone())
    }

    /// Ids of all `Active` features, sorted.
    #[must_use]
    pub fn get_active_features(&self) -> Vec<FeatureId> {
        self.features_with_status(FeatureStatus::Active)
    }

    /// Ids of all features currently in `status`, sorted.
    #[must_use]
    pub fn features_with_status(&self, status: FeatureStatus) -> Vec<FeatureId> {
        self.registry
            .read()
            .iter()
            .filter(|(_, e)| e.status() == status)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Status snapshot of the manager and every registered feature.
    #[must_use]
    pub fn get_status(&self) -> ManagerStatus {
        let entries: Vec<Arc<FeatureEntry>> = self.registry.read().values().cloned().collect();

        let features = entries
            .iter()
            .map(|entry| {
                let id = &entry.info.id;
                let (status, last_error) = {
                    let state = entry.state.read();
                    (state.status, state.last_error.clone())
                };
                FeatureSnapshot {
                    id: id.clone(),
                    name: entry.info.name.clone(),
                    version: entry.info.version.clone(),
                    status,
                    enabled: self.is_feature_enabled(id),
                    dependencies: self
                        .effective_dependencies(id)
                        .unwrap_or_else(|_| entry.info.dependencies.clone()),
                    last_error,
                }
            })
            .collect();

        ManagerStatus::from_features(self.is_initialized(), self.strict_mode(), features)
    }

    /// Structured report: status, configuration and bus metrics.
    #[must_use]
    pub fn report(&self) -> ManagerReport {
        ManagerReport {
            generated_at: current_timestamp_ms(),
            status: self.get_status(),
            config: self.config(),
            event_metrics: self.bus.all_performance_metrics(),
            events_emitted: self.bus.emitted_count(),
        }
    }

    /// `report()` as pretty-printed JSON.
    pub fn export_report(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.report())
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn entry(&self, id: &str) -> Result<Arc<FeatureEntry>, KernelError> {
        self.registry
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| KernelError::FeatureNotFound {
                feature_id: id.to_string(),
            })
    }

    fn publish(&self, topic: &str, data: serde_json::Value) {
        if let Err(e) = self.bus.emit(topic, EventPayload::new(MANAGER_SOURCE, data)) {
            warn!(topic = %topic, error = %e, "[FeatureManager] Lifecycle event dropped");
        }
    }
}
