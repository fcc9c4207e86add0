//! Metrics collection and exposition.
//!
//! # Metrics
//! - `deadline_outcomes_total` (counter): outcomes by route and kind
//! - `deadline_request_duration_seconds` (histogram): caller-observed latency
//! - `deadline_background_units` (gauge): timed-out units still running
//! - `remote_abort_total` (counter): abort notifications by result
//! - `pool_connections_open` (gauge): open remote connections
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs a recorder
//! - Labels stay low-cardinality: route path, outcome, result

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_outcome(route: &str, outcome: &'static str, start: Instant) {
    counter!("deadline_outcomes_total", "route" => route.to_owned(), "outcome" => outcome)
        .increment(1);
    histogram!("deadline_request_duration_seconds", "route" => route.to_owned())
        .record(start.elapsed().as_secs_f64());
}

pub fn set_background_units(count: u64) {
    gauge!("deadline_background_units").set(count as f64);
}

pub fn record_abort(result: &'static str) {
    counter!("remote_abort_total", "result" => result).increment(1);
}

pub fn set_pool_open(open: usize) {
    gauge!("pool_connections_open").set(open as f64);
}
