//! # Feature Status
//!
//! The per-feature lifecycle state machine.
//!
//! ```text
//!            initialize() ok                 deinitialize() ok
//! Disabled ──► Initializing ──► Active ──► Deinitializing ──► Disabled
//!    ▲              │                             │
//!    │              ▼ err                         ▼ err
//!    └──────────  Error  ◄────────────────────────┘
//!     (retry via Initializing)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a registered feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStatus {
    /// Not running. Initial and terminal state.
    #[default]
    Disabled,
    /// `initialize()` is in flight.
    Initializing,
    /// Running normally.
    Active,
    /// The last `initialize()` or `deinitialize()` failed.
    Error,
    /// `deinitialize()` is in flight.
    Deinitializing,
}

impl FeatureStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: FeatureStatus) -> bool {
        use FeatureStatus::*;
        matches!(
            (self, next),
            (Disabled, Initializing)
                | (Error, Initializing)
                | (Initializing, Active)
                | (Initializing, Error)
                | (Active, Deinitializing)
                | (Deinitializing, Disabled)
                | (Deinitializing, Error)
        )
    }

    /// True while an `initialize()` or `deinitialize()` call is in flight.
    #[must_use]
    pub fn is_transitioning(self) -> bool {
        matches!(self, Self::Initializing | Self::Deinitializing)
    }

    /// Stable lowercase label, used for log fields and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Error => "error",
            Self::Deinitializing => "deinitializing",
        }
    }
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
