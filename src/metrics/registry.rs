// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
    Encoder, HistogramVec, Opts, Registry, TextEncoder,
};
use tracing::error;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // REQUEST METRICS
    // ============================================================================

    /// Individual request attempts, including retried ones
    pub static ref REQUEST_ATTEMPTS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("request_attempts_total", "Total outbound request attempts"),
        &["method", "outcome"], // outcome: success, network, server, client, auth, terminal
        REGISTRY
    ).unwrap();

    /// Wall-clock duration of a request including all retries
    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("request_duration_seconds", "Request duration in seconds, retries included")
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["method", "status"], // status: ok, error
        REGISTRY
    ).unwrap();

    // ============================================================================
    // SESSION METRICS
    // ============================================================================

    /// Unauthorized signals seen by the session guard
    pub static ref TEARDOWN_SIGNALS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("session_teardown_signals_total", "Unauthorized signals handled by the session guard"),
        &["result"], // result: started, dropped
        REGISTRY
    ).unwrap();

    /// Teardown steps that failed
    pub static ref TEARDOWN_STEP_FAILURES: CounterVec = register_counter_vec_with_registry!(
        Opts::new("session_teardown_step_failures_total", "Failed session teardown steps"),
        &["step"],
        REGISTRY
    ).unwrap();

    /// Events published on the auth event bus
    pub static ref AUTH_EVENTS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("auth_events_total", "Events published on the auth event bus"),
        &["event"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // TOKEN METRICS
    // ============================================================================

    /// Token inspector cache operations
    pub static ref TOKEN_CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("token_cache_operations_total", "Token inspector cache operations"),
        &["operation"], // operation: hit, decode, failure
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
