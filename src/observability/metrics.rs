//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_upstream_attempts_total` (counter): upstream attempts by method, outcome
//! - `relay_upstream_failures_total` (counter): final failures by category
//! - `relay_requests_total` (counter): inbound messages by mode, method
//! - `relay_sessions_active` (gauge): live sessions
//! - `relay_sessions_evicted_total` (counter): sessions removed by reason
//! - `relay_rate_limited_total` (counter): requests throttled by the rate limiter
//! - `relay_requests_rejected_total` (counter): requests refused by the host/origin policy, by reason

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_upstream_attempt(method: &str, outcome: &'static str) {
    counter!(
        "relay_upstream_attempts_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_upstream_failure(category: &'static str) {
    counter!("relay_upstream_failures_total", "category" => category).increment(1);
}

pub fn record_request(mode: &'static str, method: &str) {
    counter!(
        "relay_requests_total",
        "mode" => mode,
        "method" => method.to_string()
    )
    .increment(1);
}

pub fn record_active_sessions(count: usize) {
    gauge!("relay_sessions_active").set(count as f64);
}

pub fn record_session_removed(reason: &'static str) {
    counter!("relay_sessions_evicted_total", "reason" => reason).increment(1);
}

pub fn record_rate_limited(reason: &'static str) {
    counter!("relay_rate_limited_total", "reason" => reason).increment(1);
}

pub fn record_rejected(reason: &'static str) {
    counter!("relay_requests_rejected_total", "reason" => reason).increment(1);
}
