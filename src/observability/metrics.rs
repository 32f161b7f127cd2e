//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hystrix_transitions_total` (counter): status changes by breaker, target status
//! - `hystrix_status` (gauge): 1=hystrix, 0=alive
//! - `hystrix_counter_buckets` (gauge): live buckets after a cleanup pass
//! - `hystrix_buckets_evicted_total` (counter): buckets removed by cleanup
//! - `hystrix_hook_panics_total` (counter): panics caught in checks or callbacks
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::breaker::Status;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_transition(breaker: &str, to: Status) {
    metrics::counter!(
        "hystrix_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_status(breaker: &str, status: Status) {
    let value = match status {
        Status::Hystrix => 1.0,
        Status::Alive => 0.0,
    };
    metrics::gauge!("hystrix_status", "breaker" => breaker.to_string()).set(value);
}

pub fn record_live_buckets(breaker: &str, live: usize) {
    metrics::gauge!("hystrix_counter_buckets", "breaker" => breaker.to_string()).set(live as f64);
}

pub fn record_buckets_evicted(breaker: &str, evicted: usize) {
    if evicted > 0 {
        metrics::counter!("hystrix_buckets_evicted_total", "breaker" => breaker.to_string())
            .increment(evicted as u64);
    }
}

pub fn record_hook_panic(breaker: &str, hook: &'static str) {
    metrics::counter!(
        "hystrix_hook_panics_total",
        "breaker" => breaker.to_string(),
        "hook" => hook
    )
    .increment(1);
}
