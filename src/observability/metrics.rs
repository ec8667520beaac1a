//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, kind
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_backend_attempts_total` (counter): forward attempts by route, outcome
//! - `gateway_routing_table_version` (gauge): active routing table version
//!
//! Recording functions are safe to call before `init_metrics`; the `metrics`
//! facade drops samples until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished client request.
///
/// `kind` is the error kind for rejections and `"ok"` for relayed responses.
pub fn record_request(method: &str, status: u16, kind: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "kind" => kind.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one outbound attempt. `outcome` is a short tag such as
/// `"response"`, `"timeout"` or `"connection"`.
pub fn record_backend_attempt(route: &str, outcome: &'static str) {
    counter!(
        "gateway_backend_attempts_total",
        "route" => route.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_table_version(version: u64) {
    gauge!("gateway_routing_table_version").set(version as f64);
}
