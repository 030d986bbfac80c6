//! Topics the kernel itself emits on.
//!
//! The topic namespace is open; features define their own topics. These are
//! the only ones the kernel produces.

/// A feature reached `Active`.
pub const FEATURE_INITIALIZED: &str = "FEATURE_INITIALIZED";

/// A feature went back to `Disabled`.
pub const FEATURE_DEINITIALIZED: &str = "FEATURE_DEINITIALIZED";

/// A feature's `initialize()` or `deinitialize()` failed.
pub const FEATURE_ERROR: &str = "FEATURE_ERROR";

/// Emitted on every status transition.
pub const FEATURE_STATUS_CHANGED: &str = "FEATURE_STATUS_CHANGED";

/// A feature was skipped or rejected because dependencies were not active.
pub const DEPENDENCY_MISSING: &str = "DEPENDENCY_MISSING";

/// A feature was added to the registry.
pub const FEATURE_REGISTERED: &str = "FEATURE_REGISTERED";

/// A feature was removed from the registry.
pub const FEATURE_UNREGISTERED: &str = "FEATURE_UNREGISTERED";

/// Every lifecycle topic, in declaration order.
pub const LIFECYCLE_TOPICS: [&str; 7] = [
    FEATURE_INITIALIZED,
    FEATURE_DEINITIALIZED,
    FEATURE_ERROR,
    FEATURE_STATUS_CHANGED,
    DEPENDENCY_MISSING,
    FEATURE_REGISTERED,
    FEATURE_UNREGISTERED,
];
