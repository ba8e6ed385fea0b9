//! Metrics collection.
//!
//! # Metrics
//! - `elastic_requests_total` (counter): logical calls by method, status
//! - `elastic_request_duration_seconds` (histogram): call latency incl. retries
//! - `elastic_request_retries_total` (counter): retries by reason
//! - `elastic_endpoint_alive` (gauge): 1=alive, 0=dead, per node URL
//! - `elastic_endpoint_resurrections_total` (counter): all-dead resurrections
//!
//! # Design Decisions
//! - Uses the `metrics` facade only; the application installs an exporter
//! - Status label `0` marks calls that ended without a response

use std::time::Instant;

/// Record a completed logical call.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let duration = start.elapsed().as_secs_f64();
    metrics::counter!(
        "elastic_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("elastic_request_duration_seconds", "method" => method.to_string())
        .record(duration);
}

/// Record a retry decided by the retry policy.
pub fn record_retry(reason: &'static str) {
    metrics::counter!("elastic_request_retries_total", "reason" => reason).increment(1);
}

/// Record the liveness of a node.
pub fn record_endpoint_state(url: &str, alive: bool) {
    metrics::gauge!("elastic_endpoint_alive", "url" => url.to_string())
        .set(if alive { 1.0 } else { 0.0 });
}

/// Record that `count` dead nodes were resurrected at once.
pub fn record_resurrection(count: usize) {
    metrics::counter!("elastic_endpoint_resurrections_total").increment(count as u64);
}
