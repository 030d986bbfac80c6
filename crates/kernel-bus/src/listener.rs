//! # Listeners
//!
//! A listener is a handler bound to one topic with a priority and a
//! one-shot flag.

use kernel_types::EventPayload;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error a listener may return. Logged by the bus, never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of listener handlers.
pub type ListenerResult = Result<(), ListenerError>;

/// Type-erased listener handler.
pub type Handler = Arc<dyn Fn(&EventPayload) -> ListenerResult + Send + Sync>;

/// Handle identifying one registration. Ids are allocated in registration
/// order, so they double as the tie-breaker for equal priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    /// Raw numeric id.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// One registration in a topic's listener list.
pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) priority: i32,
    pub(crate) once: bool,
    pub(crate) handler: Handler,
    fired: AtomicBool,
}

impl ListenerEntry {
    pub(crate) fn new(id: ListenerId, priority: i32, once: bool, handler: Handler) -> Self {
        Self {
            id,
            priority,
            once,
            handler,
            fired: AtomicBool::new(false),
        }
    }

    /// Claim the single invocation of a once-listener. Returns `false` if a
    /// nested dispatch already claimed it. Always `true` for regular ones.
    pub(crate) fn claim(&self) -> bool {
        !self.once || !self.fired.swap(true, Ordering::AcqRel)
    }

    /// A once-listener whose invocation has been claimed.
    pub(crate) fn is_spent(&self) -> bool {
        self.once && self.fired.load(Ordering::Acquire)
    }
}

/// Sort order of a topic's list: priority descending, then registration
/// order ascending.
pub(crate) fn sort_listeners(list: &mut [Arc<ListenerEntry>]) {
    list.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
}
