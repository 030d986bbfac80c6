//! # Kernel Bus - In-Process Event Bus
//!
//! Publish/subscribe channel shared by the feature manager and the features
//! it drives.
//!
//! ## Dispatch Pipeline
//!
//! ```text
//! emit(topic, payload)
//!     │
//!     ▼
//! stamp timestamp ──► middleware[0] ──► middleware[1] ──► ...
//!                                                        │
//!         ┌──────────────────────────────────────────────┘
//!         ▼
//! listeners[topic]  (priority desc, registration asc)
//!     L1 ──► L2 ──► L3      errors/panics caught per listener
//!         │
//!         ▼
//! drop fired once-listeners, record latency
//! ```
//!
//! ## Re-entrancy
//!
//! Dispatch is synchronous. A listener may emit again, and the nested emit
//! runs to completion on the same stack before the outer sweep resumes. The
//! nesting depth of each bus is bounded per thread by `MAX_DISPATCH_DEPTH`;
//! emits on another bus do not count against it.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod listener;
pub mod metrics;
pub mod middleware;
pub mod topics;

pub use bus::{DispatchReport, EventBus};
pub use listener::{ListenerError, ListenerId, ListenerResult};
pub use metrics::DispatchMetrics;
pub use middleware::MiddlewareResult;

/// Priority of listeners registered without one.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Latency samples kept per topic.
pub const METRICS_WINDOW: usize = 100;

/// Deepest allowed chain of listeners emitting from inside a dispatch.
pub const MAX_DISPATCH_DEPTH: usize = 32;
