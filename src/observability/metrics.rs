//! Metrics collection and exposition.
//!
//! # Metrics
//! - `replay_requests_total` (counter): replayed exchanges by `outcome`
//! - `replay_lookup_duration_seconds` (histogram): lookup + read + rewrite
//! - `replay_connections_active` (gauge): open client connections
//! - `replay_parse_errors_total` (counter): connections torn down by a parse error
//! - `replay_index_response_records` (gauge): response locators in the index
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is optional and serves its own HTTP listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(outcome: &'static str, start: Instant) {
    counter!("replay_requests_total", "outcome" => outcome).increment(1);
    histogram!("replay_lookup_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn connection_opened() {
    gauge!("replay_connections_active").increment(1.0);
}

pub fn connection_closed() {
    gauge!("replay_connections_active").decrement(1.0);
}

pub fn record_parse_error() {
    counter!("replay_parse_errors_total").increment(1);
}

pub fn record_index_size(responses: usize) {
    gauge!("replay_index_response_records").set(responses as f64);
}
