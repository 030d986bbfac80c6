//! # Feature Manager
//!
//! Registry and lifecycle driver for pluggable features.
//!
//! ## Responsibilities
//!
//! - Keep the set of registered features and their configuration records
//! - Resolve initialization order from declared (or overridden) dependencies
//! - Drive each feature through `Disabled → Initializing → Active` and back
//! - Publish every transition on the kernel [`EventBus`](kernel_bus::EventBus)
//!
//! ## Example
//!
//! ```rust,ignore
//! let bus = Arc::new(EventBus::new());
//! let manager = FeatureManager::new(Arc::clone(&bus), KernelConfig::from_json(&raw)?);
//!
//! manager.register_feature(Arc::new(OfflineSync::default()));
//! manager.initialize().await?;
//! // ...
//! manager.deinitialize().await;
//! ```

pub mod manager;
pub mod resolver;
pub mod snapshot;

pub use manager::{FeatureManager, MANAGER_SOURCE};
pub use resolver::topological_order;
pub use snapshot::{FeatureSnapshot, ManagerReport, ManagerStatus};
