//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): inbound requests by method, status
//! - `proxy_request_duration_seconds` (histogram): inbound latency
//! - `proxy_cache_lookups_total` (counter): hit / miss / stale / default
//! - `proxy_cache_entries` (gauge): cached responses
//! - `proxy_cache_evictions_total` (counter): capacity evictions
//! - `proxy_upstream_attempts_total` (counter): per-attempt outcome class
//! - `proxy_scheduler_active` / `proxy_scheduler_queued` (gauges)
//! - `proxy_rate_limited_total` (counter)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// `outcome` is one of `hit`, `miss`, `stale`, `default`.
pub fn record_cache_lookup(outcome: &'static str) {
    counter!("proxy_cache_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("proxy_cache_entries").set(entries as f64);
}

pub fn record_cache_eviction() {
    counter!("proxy_cache_evictions_total").increment(1);
}

/// `outcome` is a status class (`2xx`, `4xx`, ...) or `transport`.
pub fn record_upstream_attempt(outcome: &'static str) {
    counter!("proxy_upstream_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_scheduler(active: usize, queued: usize) {
    gauge!("proxy_scheduler_active").set(active as f64);
    gauge!("proxy_scheduler_queued").set(queued as f64);
}

pub fn record_rate_limited() {
    counter!("proxy_rate_limited_total").increment(1);
}
