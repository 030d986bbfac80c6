//! # Feature Trait - Pluggable Capability Contract
//!
//! Defines the contract every pluggable capability implements to take part in
//! the kernel's dependency-ordered lifecycle.
//!
//! ## Design Philosophy
//!
//! - **Kernel owns the lifecycle**: features implement `initialize` and
//!   `deinitialize`; the manager decides when (and whether) they run.
//! - **Declared dependencies**: a feature only initializes once every id in
//!   `dependencies()` is `Active`.
//! - **Event-only collaboration**: features talk to each other through the
//!   event bus, never by holding references to one another.
//!
//! ## Example Implementation
//!
//! ```rust,ignore
//! use kernel_types::{Feature, FeatureError};
//! use async_trait::async_trait;
//!
//! pub struct OfflineSync { /* ... */ }
//!
//! #[async_trait]
//! impl Feature for OfflineSync {
//!     fn id(&self) -> &str { "offlineSync" }
//!     fn name(&self) -> &str { "Offline Sync" }
//!     fn dependencies(&self) -> Vec<String> { vec!["networkMonitor".into()] }
//!     async fn initialize(&self) -> Result<(), FeatureError> { Ok(()) }
//!     async fn deinitialize(&self) -> Result<(), FeatureError> { Ok(()) }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Unique string key of a feature.
pub type FeatureId = String;

/// Error returned by a feature's own lifecycle hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureError {
    /// The feature that encountered the error.
    pub feature_id: FeatureId,
    /// Error kind.
    pub kind: FeatureErrorKind,
    /// Human-readable error message.
    pub message: String,
}

impl FeatureError {
    /// Create a new feature error.
    pub fn new(
        feature_id: impl Into<FeatureId>,
        kind: FeatureErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            feature_id: feature_id.into(),
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for an `InitializationFailed` error.
    pub fn initialization(feature_id: impl Into<FeatureId>, message: impl Into<String>) -> Self {
        Self::new(feature_id, FeatureErrorKind::InitializationFailed, message)
    }

    /// Shorthand for a `ShutdownFailed` error.
    pub fn shutdown(feature_id: impl Into<FeatureId>, message: impl Into<String>) -> Self {
        Self::new(feature_id, FeatureErrorKind::ShutdownFailed, message)
    }
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.feature_id, self.kind, self.message)
    }
}

impl std::error::Error for FeatureError {}

/// Categories of feature errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureErrorKind {
    /// Feature failed to initialize.
    InitializationFailed,
    /// Feature failed to shut down cleanly.
    ShutdownFailed,
    /// Feature configuration was rejected by the feature itself.
    ConfigurationError,
    /// A platform collaborator the feature wraps is unavailable.
    NotAvailable,
    /// Any other runtime failure.
    RuntimeError,
}

impl fmt::Display for FeatureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed => write!(f, "InitializationFailed"),
            Self::ShutdownFailed => write!(f, "ShutdownFailed"),
            Self::ConfigurationError => write!(f, "ConfigurationError"),
            Self::NotAvailable => write!(f, "NotAvailable"),
            Self::RuntimeError => write!(f, "RuntimeError"),
        }
    }
}

/// Descriptive metadata about a feature, used for snapshots and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInfo {
    /// Unique identifier.
    pub id: FeatureId,
    /// Human-readable name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Declared dependencies (before any configuration override).
    pub dependencies: Vec<FeatureId>,
}

impl FeatureInfo {
    /// Create info with the required fields.
    pub fn new(id: impl Into<FeatureId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: "1.0.0".to_string(),
            dependencies: Vec::new(),
        }
    }

    /// Set the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add dependencies.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FeatureId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// The core trait every pluggable feature implements.
///
/// `initialize` and `deinitialize` may perform blocking or asynchronous work.
/// The manager calls each at most once per transition and never concurrently
/// for the same feature.
#[async_trait]
pub trait Feature: Send + Sync {
    /// Unique identifier, stable for the process lifetime.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Version string. Descriptive only.
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// Ids of features that must be `Active` before this one initializes.
    fn dependencies(&self) -> Vec<FeatureId> {
        Vec::new()
    }

    /// Feature-owned configuration. The kernel never inspects it.
    fn config(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Collected metadata.
    fn info(&self) -> FeatureInfo {
        FeatureInfo::new(self.id(), self.name())
            .with_version(self.version())
            .depends_on(self.dependencies())
    }

    /// Bring the feature up.
    async fn initialize(&self) -> Result<(), FeatureError>;

    /// Tear the feature down.
    async fn deinitialize(&self) -> Result<(), FeatureError>;
}

/// A shared, type-erased feature handle.
pub type DynFeature = Arc<dyn Feature>;
