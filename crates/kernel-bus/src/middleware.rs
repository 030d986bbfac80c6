//! Payload-transforming middleware.
//!
//! Middleware sees every emission, on every topic, before any listener. It
//! can only rewrite the payload: it cannot veto or redirect a dispatch.

use crate::listener::ListenerError;
use kernel_types::EventPayload;
use std::sync::Arc;

/// Return type of middleware functions.
pub type MiddlewareResult = Result<EventPayload, ListenerError>;

/// Type-erased middleware function: `(topic, payload) -> payload'`.
pub type Middleware = Arc<dyn Fn(&str, &EventPayload) -> MiddlewareResult + Send + Sync>;
