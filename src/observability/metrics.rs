//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webguard_rate_limited_total` (counter): requests refused by the rate limiter
//! - `webguard_csrf_rejected_total` (counter): mutating requests without a valid token
//! - `webguard_cache_lookups_total` (counter): by `cache` (fragment, response) and `result` (hit, miss)
//! - `webguard_session_commits_total` (counter): by `outcome` (skipped, saved, deleted, failed)
//! - `webguard_literal_verifications_total` (counter): by `result` (verified, rejected, unavailable)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Prometheus exporter is only installed when enabled in config

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_rate_limited() {
    metrics::counter!("webguard_rate_limited_total").increment(1);
}

pub fn record_csrf_rejected() {
    metrics::counter!("webguard_csrf_rejected_total").increment(1);
}

pub fn record_cache_lookup(cache: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("webguard_cache_lookups_total", "cache" => cache, "result" => result)
        .increment(1);
}

pub fn record_session_commit(outcome: &'static str) {
    metrics::counter!("webguard_session_commits_total", "outcome" => outcome).increment(1);
}

pub fn record_literal_verification(result: &'static str) {
    metrics::counter!("webguard_literal_verifications_total", "result" => result).increment(1);
}
