//! Metrics collection and exposition.
//!
//! # Metrics
//! - `interceptor_requests_total` (counter): logical calls by method, outcome
//! - `interceptor_request_duration_seconds` (histogram): end-to-end latency
//! - `interceptor_refresh_total` (counter): credential refreshes by outcome
//! - `interceptor_retries_total` (counter): retries by kind (auth, generic)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed recorder it is a no-op
//! - The Prometheus exporter is opt-in

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished logical call.
pub fn record_request(method: &str, outcome: &'static str, start: Instant) {
    metrics::counter!(
        "interceptor_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("interceptor_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record the outcome of one credential refresh.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("interceptor_refresh_total", "outcome" => outcome).increment(1);
}

/// Record one retry of the given kind.
pub fn record_retry(kind: &'static str) {
    metrics::counter!("interceptor_retries_total", "kind" => kind).increment(1);
}
