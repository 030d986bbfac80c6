//! # Event Bus
//!
//! Synchronous, priority-ordered publish/subscribe with a global middleware
//! chain and per-topic latency tracking.

use crate::listener::{sort_listeners, Handler, ListenerEntry, ListenerId, ListenerResult};
use crate::metrics::{DispatchMetrics, LatencyWindow};
use crate::middleware::{Middleware, MiddlewareResult};
use crate::{DEFAULT_PRIORITY, MAX_DISPATCH_DEPTH, METRICS_WINDOW};
use kernel_telemetry::metrics as telemetry;
use kernel_types::{current_timestamp_ms, BusError, EventPayload};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

thread_local! {
    /// Nesting depth on this thread, keyed by bus address.
    static DISPATCH_DEPTH: RefCell<HashMap<usize, usize>> = RefCell::new(HashMap::new());
}

/// Increments one bus's dispatch depth on this thread for the lifetime of
/// one emit. Emits on other buses do not count against it.
struct DepthGuard {
    bus: usize,
}

impl DepthGuard {
    fn enter(bus: usize) -> Self {
        DISPATCH_DEPTH.with(|d| *d.borrow_mut().entry(bus).or_insert(0) += 1);
        Self { bus }
    }

    fn current(bus: usize) -> usize {
        DISPATCH_DEPTH.with(|d| d.borrow().get(&bus).copied().unwrap_or(0))
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DISPATCH_DEPTH.with(|d| {
            let mut depths = d.borrow_mut();
            if let Some(depth) = depths.get_mut(&self.bus) {
                *depth = depth.saturating_sub(1);
                if *depth == 0 {
                    depths.remove(&self.bus);
                }
            }
        });
    }
}

/// Outcome of one `emit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Topic the payload was emitted on.
    pub topic: String,
    /// Listeners that ran and returned `Ok`.
    pub delivered: usize,
    /// Listeners that returned an error or panicked.
    pub failed: usize,
}

/// The in-process event bus.
///
/// Listener and middleware tables are behind `parking_lot` locks that are
/// never held while user code runs, so listeners may subscribe, unsubscribe
/// and emit from inside a dispatch.
pub struct EventBus {
    /// Topic → listeners, sorted by (priority desc, registration asc).
    listeners: RwLock<HashMap<String, Vec<Arc<ListenerEntry>>>>,

    /// Global middleware chain, in registration order.
    middleware: RwLock<Vec<Middleware>>,

    /// Topic → recent dispatch latencies.
    metrics: Mutex<HashMap<String, LatencyWindow>>,

    /// Next listener id.
    next_id: AtomicU64,

    /// Total emissions that reached dispatch.
    events_emitted: AtomicU64,

    /// Re-entrancy bound for nested emits.
    max_depth: usize,
}

impl EventBus {
    /// Create an empty bus with the default depth guard.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_depth(MAX_DISPATCH_DEPTH)
    }

    /// Create an empty bus that refuses emits nested deeper than `max_depth`.
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            middleware: RwLock::new(Vec::new()),
            metrics: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            events_emitted: AtomicU64::new(0),
            max_depth,
        }
    }

    // =========================================================================
    // SUBSCRIPTION
    // =========================================================================

    /// Register `handler` on `topic`.
    ///
    /// The topic's list is re-sorted by priority (descending); listeners with
    /// equal priority keep their registration order.
    pub fn add_listener<F>(
        &self,
        topic: impl Into<String>,
        handler: F,
        priority: i32,
        once: bool,
    ) -> ListenerId
    where
        F: Fn(&EventPayload) -> ListenerResult + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler = Arc::new(handler);
        let entry = Arc::new(ListenerEntry::new(id, priority, once, handler));

        let mut listeners = self.listeners.write();
        let list = listeners.entry(topic.clone()).or_default();
        list.push(entry);
        sort_listeners(list);

        debug!(topic = %topic, listener = %id, priority, once, "Listener added");
        id
    }

    /// Register `handler` on `topic` with the default priority.
    pub fn on<F>(&self, topic: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&EventPayload) -> ListenerResult + Send + Sync + 'static,
    {
        self.add_listener(topic, handler, DEFAULT_PRIORITY, false)
    }

    /// Register a listener that is removed after its first invocation.
    pub fn once<F>(&self, topic: impl Into<String>, handler: F, priority: i32) -> ListenerId
    where
        F: Fn(&EventPayload) -> ListenerResult + Send + Sync + 'static,
    {
        self.add_listener(topic, handler, priority, true)
    }

    /// Remove one registration. Returns `false` if it was not on `topic`.
    pub fn remove_listener(&self, topic: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(topic) else {
            return false;
        };

        let Some(index) = list.iter().position(|e| e.id == id) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            listeners.remove(topic);
        }

        debug!(topic = %topic, listener = %id, "Listener removed");
        true
    }

    /// Remove every listener of `topic`, or of all topics when `None`.
    pub fn remove_all_listeners(&self, topic: Option<&str>) {
        let mut listeners = self.listeners.write();
        match topic {
            Some(topic) => {
                listeners.remove(topic);
            }
            None => listeners.clear(),
        }
    }

    /// Number of listeners currently registered on `topic`.
    #[must_use]
    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners.read().get(topic).map_or(0, Vec::len)
    }

    /// Topics with at least one listener, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.listeners.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    // =========================================================================
    // MIDDLEWARE
    // =========================================================================

    /// Append a middleware to the global chain.
    pub fn add_middleware<F>(&self, middleware: F)
    where
        F: Fn(&str, &EventPayload) -> MiddlewareResult + Send + Sync + 'static,
    {
        self.middleware.write().push(Arc::new(middleware));
    }

    /// Drop the whole middleware chain.
    pub fn clear_middleware(&self) {
        self.middleware.write().clear();
    }

    /// Number of registered middleware.
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.middleware.read().len()
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Emit `payload` on `topic`.
    ///
    /// Listener failures are logged and counted in the report; they never
    /// reach the caller. The only error is the re-entrancy guard tripping, in
    /// which case nothing is dispatched.
    pub fn emit(&self, topic: &str, mut payload: EventPayload) -> Result<DispatchReport, BusError> {
        let key = self as *const Self as usize;
        let depth = DepthGuard::current(key);
        if depth >= self.max_depth {
            warn!(topic = %topic, depth, "Dispatch depth exceeded, event dropped");
            return Err(BusError::DispatchDepthExceeded {
                topic: topic.to_string(),
                depth,
            });
        }
        let _guard = DepthGuard::enter(key);

        payload.topic = topic.to_string();
        if payload.timestamp.is_none() {
            payload.timestamp = Some(current_timestamp_ms());
        }
        let payload = self.apply_middleware(topic, payload);

        self.events_emitted.fetch_add(1, Ordering::Relaxed);

        // Snapshot so handlers run without the table lock held.
        let snapshot: Vec<Arc<ListenerEntry>> = self
            .listeners
            .read()
            .get(topic)
            .cloned()
            .unwrap_or_default();

        let started = Instant::now();
        let mut report = DispatchReport {
            topic: topic.to_string(),
            delivered: 0,
            failed: 0,
        };
        let mut spent_once = false;

        for entry in &snapshot {
            if !entry.claim() {
                continue;
            }
            spent_once |= entry.once;

            match invoke(&entry.handler, &payload) {
                Ok(()) => report.delivered += 1,
                Err(message) => {
                    report.failed += 1;
                    telemetry::LISTENER_FAILURES.inc();
                    let err = BusError::ListenerExecution {
                        topic: topic.to_string(),
                        listener: entry.id.as_u64(),
                        message,
                    };
                    error!(topic = %topic, listener = %entry.id, error = %err, "Listener failed");
                }
            }
        }

        if spent_once {
            self.drop_spent(topic);
        }

        let elapsed = started.elapsed();
        self.record_latency(topic, elapsed.as_secs_f64() * 1000.0);
        telemetry::record_dispatch(topic, elapsed.as_secs_f64());

        debug!(
            topic = %topic,
            source = %payload.source,
            delivered = report.delivered,
            failed = report.failed,
            "Event dispatched"
        );
        Ok(report)
    }

    /// Thread the payload through every middleware in registration order. A
    /// failing middleware is skipped: the payload from before it carries on.
    fn apply_middleware(&self, topic: &str, payload: EventPayload) -> EventPayload {
        let chain: Vec<Middleware> = self.middleware.read().clone();

        chain
            .iter()
            .enumerate()
            .fold(payload, |current, (index, middleware)| {
                let result = catch_unwind(AssertUnwindSafe(|| middleware(topic, &current)));
                match result {
                    Ok(Ok(next)) => next,
                    Ok(Err(e)) => {
                        log_middleware_failure(topic, index, e.to_string());
                        current
                    }
                    Err(panic) => {
                        log_middleware_failure(topic, index, panic_message(panic.as_ref()));
                        current
                    }
                }
            })
    }

    /// Remove once-listeners of `topic` whose invocation has been claimed.
    fn drop_spent(&self, topic: &str) {
        let mut listeners = self.listeners.write();
        if let Some(list) = listeners.get_mut(topic) {
            list.retain(|e| !e.is_spent());
            if list.is_empty() {
                listeners.remove(topic);
            }
        }
    }

    // =========================================================================
    // METRICS
    // =========================================================================

    fn record_latency(&self, topic: &str, sample_ms: f64) {
        self.metrics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(|| LatencyWindow::new(METRICS_WINDOW))
            .push(sample_ms);
    }

    /// Latency summary over the last `METRICS_WINDOW` emits on `topic`.
    /// Zeroed when the topic has never been emitted on.
    #[must_use]
    pub fn performance_metrics(&self, topic: &str) -> DispatchMetrics {
        self.metrics
            .lock()
            .get(topic)
            .map(LatencyWindow::summary)
            .unwrap_or_default()
    }

    /// Latency summaries for every topic emitted on so far.
    #[must_use]
    pub fn all_performance_metrics(&self) -> BTreeMap<String, DispatchMetrics> {
        self.metrics
            .lock()
            .iter()
            .map(|(topic, window)| (topic.clone(), window.summary()))
            .collect()
    }

    /// Forget all latency samples.
    pub fn reset_metrics(&self) {
        self.metrics.lock().clear();
    }

    /// Total emits that reached dispatch.
    #[must_use]
    pub fn emitted_count(&self) -> u64 {
        self.events_emitted.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one handler, turning both `Err` and panics into a message.
fn invoke(handler: &Handler, payload: &EventPayload) -> Result<(), String> {
    match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

fn log_middleware_failure(topic: &str, index: usize, message: String) {
    telemetry::MIDDLEWARE_FAILURES.inc();
    let err = BusError::Middleware {
        topic: topic.to_string(),
        index,
        message,
    };
    error!(topic = %topic, error = %err, "Middleware failed, payload left unchanged");
}
