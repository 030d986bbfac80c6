//! # Kernel Types Crate
//!
//! Contract and data types shared by every part of the feature kernel.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the `Feature` trait, `FeatureStatus` and the
//!   error taxonomy are defined once, here.
//! - **Kernel-Owned Status**: features never report their own lifecycle state;
//!   the manager drives `FeatureStatus` through `can_transition_to`.
//! - **Opaque Config**: per-feature configuration is a `serde_json::Value` the
//!   kernel stores and hands back but never inspects.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod errors;
pub mod event;
pub mod feature;
pub mod status;

pub use config::{FeatureConfig, KernelConfig};
pub use errors::{BusError, KernelError};
pub use event::{current_timestamp_ms, EventPayload};
pub use feature::{DynFeature, Feature, FeatureError, FeatureErrorKind, FeatureId, FeatureInfo};
pub use status::FeatureStatus;
