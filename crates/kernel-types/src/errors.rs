//! # Error Types
//!
//! Errors raised by the feature manager and the event bus.

use crate::feature::{FeatureError, FeatureId};
use crate::status::FeatureStatus;
use thiserror::Error;

/// Errors from feature lifecycle management.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KernelError {
    /// Strict mode: a feature's dependencies are not all `Active`.
    #[error("Feature {feature_id} is missing dependencies: {missing:?}")]
    MissingDependency {
        feature_id: FeatureId,
        missing: Vec<FeatureId>,
    },

    /// The dependency graph of a batch contains a cycle.
    #[error("Circular dependency detected at feature {feature_id}")]
    CircularDependency { feature_id: FeatureId },

    /// An operation referenced an unregistered id.
    #[error("Feature not found: {feature_id}")]
    FeatureNotFound { feature_id: FeatureId },

    /// The feature's own `initialize()` failed.
    #[error("Feature {feature_id} failed to initialize: {source}")]
    Initialization {
        feature_id: FeatureId,
        #[source]
        source: FeatureError,
    },

    /// The feature's own `deinitialize()` failed.
    #[error("Feature {feature_id} failed to deinitialize: {source}")]
    Deinitialization {
        feature_id: FeatureId,
        #[source]
        source: FeatureError,
    },

    /// Another transition is already in flight for the feature.
    #[error("Feature {feature_id} is already {status}")]
    TransitionInProgress {
        feature_id: FeatureId,
        status: FeatureStatus,
    },
}

impl KernelError {
    /// The feature id the error is about.
    #[must_use]
    pub fn feature_id(&self) -> &str {
        match self {
            Self::MissingDependency { feature_id, .. }
            | Self::CircularDependency { feature_id }
            | Self::FeatureNotFound { feature_id }
            | Self::Initialization { feature_id, .. }
            | Self::Deinitialization { feature_id, .. }
            | Self::TransitionInProgress { feature_id, .. } => feature_id,
        }
    }
}

/// Errors from the event bus.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// A listener returned an error or panicked. Logged, never surfaced to
    /// the emitter.
    #[error("Listener {listener} on {topic} failed: {message}")]
    ListenerExecution {
        topic: String,
        listener: u64,
        message: String,
    },

    /// A middleware returned an error; the payload from before it is kept.
    #[error("Middleware #{index} failed on {topic}: {message}")]
    Middleware {
        topic: String,
        index: usize,
        message: String,
    },

    /// Nested emits from listeners went deeper than the guard allows.
    #[error("Dispatch depth {depth} exceeded on {topic}")]
    DispatchDepthExceeded { topic: String, depth: usize },
}
