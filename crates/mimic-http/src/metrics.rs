//! Prometheus metrics for the mock server.
//!
//! Tracks dispatch outcomes, dispatch latency and verification results.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Requests handled, by outcome
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mimic_requests_total",
        "Total number of requests handled by the mock",
        &["method", "outcome"]  // outcome: matched|not_found|error
    )
    .expect("mimic_requests_total registers once");

    /// Time spent matching and materializing, in milliseconds
    pub static ref DISPATCH_DURATION_MS: HistogramVec = register_histogram_vec!(
        "mimic_dispatch_duration_ms",
        "Histogram of dispatch time in milliseconds",
        &["outcome"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 100.0]
    )
    .expect("mimic_dispatch_duration_ms registers once");

    /// Verification passes, by result
    pub static ref VERIFICATIONS_TOTAL: CounterVec = register_counter_vec!(
        "mimic_verifications_total",
        "Total number of verification passes",
        &["result"]  // result: satisfied|unsatisfied
    )
    .expect("mimic_verifications_total registers once");
}

/// Outcome label values.
pub const OUTCOME_MATCHED: &str = "matched";
pub const OUTCOME_NOT_FOUND: &str = "not_found";
pub const OUTCOME_ERROR: &str = "error";

/// All registered metrics in Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_dispatch(method: &str, outcome: &str, duration_ms: f64) {
    REQUESTS_TOTAL.with_label_values(&[method, outcome]).inc();
    DISPATCH_DURATION_MS
        .with_label_values(&[outcome])
        .observe(duration_ms);
}

pub fn record_verification(satisfied: bool) {
    let result = if satisfied { "satisfied" } else { "unsatisfied" };
    VERIFICATIONS_TOTAL.with_label_values(&[result]).inc();
}
