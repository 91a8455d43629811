//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound requests by method, status
//! - `gateway_request_duration_seconds` (histogram): inbound latency
//! - `gateway_forward_duration_seconds` (histogram): time spent waiting on nodes
//! - `gateway_forward_failures_total` (counter): unreachable or non-2xx nodes
//! - `gateway_denied_total` (counter): gate rejections by reason
//! - `gateway_proxy_mutations_total` (counter): directory writes by operation
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op, so tests need no setup
//! - Labels never carry user ids, tokens or payloads

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_forward(mode: &'static str, status: u16, start: Instant) {
    metrics::histogram!(
        "gateway_forward_duration_seconds",
        "mode" => mode,
        "status" => status.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_forward_failure(kind: &'static str) {
    metrics::counter!("gateway_forward_failures_total", "kind" => kind).increment(1);
}

pub fn record_denied(reason: &'static str) {
    metrics::counter!("gateway_denied_total", "reason" => reason).increment(1);
}

pub fn record_proxy_mutation(operation: &'static str) {
    metrics::counter!("gateway_proxy_mutations_total", "operation" => operation).increment(1);
}
