//! Prometheus metrics for the feature kernel.
//!
//! All metrics follow the naming convention: `kernel_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., events emitted)
//! - **Histogram**: Distribution of values (e.g., dispatch duration)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Histogram, HistogramOpts, IntCounter, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Kernel metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT BUS METRICS
    // =========================================================================

    /// Emissions per topic
    pub static ref EVENTS_EMITTED: CounterVec = CounterVec::new(
        Opts::new("kernel_bus_events_emitted_total", "Total events emitted on the bus"),
        &["topic"]
    ).expect("metric creation failed");

    /// Listener invocations that returned an error or panicked
    pub static ref LISTENER_FAILURES: IntCounter = IntCounter::new(
        "kernel_bus_listener_failures_total",
        "Total listener invocations that failed"
    ).expect("metric creation failed");

    /// Middleware invocations that returned an error
    pub static ref MIDDLEWARE_FAILURES: IntCounter = IntCounter::new(
        "kernel_bus_middleware_failures_total",
        "Total middleware invocations that failed"
    ).expect("metric creation failed");

    /// Time spent dispatching one emission to all listeners
    pub static ref DISPATCH_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "kernel_bus_dispatch_duration_seconds",
            "Time spent dispatching an event to its listeners"
        ).buckets(exponential_buckets(0.000_01, 4.0, 10).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // FEATURE MANAGER METRICS
    // =========================================================================

    /// Status transitions by target status
    pub static ref FEATURE_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("kernel_feature_transitions_total", "Total feature status transitions"),
        &["status"]
    ).expect("metric creation failed");

    /// Lifecycle failures by phase (initialize, deinitialize, dependency)
    pub static ref FEATURE_FAILURES: CounterVec = CounterVec::new(
        Opts::new("kernel_feature_failures_total", "Total feature lifecycle failures"),
        &["phase"]
    ).expect("metric creation failed");
}

/// Register all kernel metrics with `REGISTRY`.
///
/// Safe to call more than once; a second registration of the same collector
/// is reported by Prometheus as `AlreadyReg` and ignored here.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(EVENTS_EMITTED.clone()),
        Box::new(LISTENER_FAILURES.clone()),
        Box::new(MIDDLEWARE_FAILURES.clone()),
        Box::new(DISPATCH_DURATION.clone()),
        Box::new(FEATURE_TRANSITIONS.clone()),
        Box::new(FEATURE_FAILURES.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode the registry in the Prometheus text exposition format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Record one emission and its dispatch latency.
pub fn record_dispatch(topic: &str, seconds: f64) {
    EVENTS_EMITTED.with_label_values(&[topic]).inc();
    DISPATCH_DURATION.observe(seconds);
}

/// Record a feature entering `status`.
pub fn record_transition(status: &str) {
    FEATURE_TRANSITIONS.with_label_values(&[status]).inc();
}

/// Record a lifecycle failure in `phase`.
pub fn record_failure(phase: &str) {
    FEATURE_FAILURES.with_label_values(&[phase]).inc();
}
