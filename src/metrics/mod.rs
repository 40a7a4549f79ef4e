// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics,
    REGISTRY,
    REQUEST_ATTEMPTS,
    REQUEST_DURATION,
    TEARDOWN_SIGNALS,
    TEARDOWN_STEP_FAILURES,
    AUTH_EVENTS,
    TOKEN_CACHE_OPERATIONS,
};

/// Helper to record a single request attempt
pub fn record_request_attempt(method: &str, outcome: &str) {
    REQUEST_ATTEMPTS.with_label_values(&[method, outcome]).inc();
}

/// Helper to record a request including its retries
pub fn record_request(method: &str, ok: bool, duration_secs: f64) {
    let status = if ok { "ok" } else { "error" };
    REQUEST_DURATION
        .with_label_values(&[method, status])
        .observe(duration_secs);
}

/// Helper to record session guard metrics
pub fn record_teardown_signal(result: &str) {
    TEARDOWN_SIGNALS.with_label_values(&[result]).inc();
}

pub fn record_teardown_step_failure(step: &str) {
    TEARDOWN_STEP_FAILURES.with_label_values(&[step]).inc();
}

pub fn record_auth_event(event: &str) {
    AUTH_EVENTS.with_label_values(&[event]).inc();
}

/// Helper to record token inspector cache operations
pub fn record_token_cache(operation: &str) {
    TOKEN_CACHE_OPERATIONS.with_label_values(&[operation]).inc();
}
