//! Metrics collection and exposition.
//!
//! # Metrics
//! - `cnxmd_sessions_total` (counter): finished sessions by outcome
//! - `cnxmd_active_sessions` (gauge): sessions currently in flight
//! - `cnxmd_bytes_relayed_total` (counter): payload bytes by direction
//! - `cnxmd_teardown_timeouts_total` (counter): sessions force-closed after the teardown bound
//! - `cnxmd_accept_errors_total` (counter): failed accepts
//!
//! Recording is a no-op until an exporter is installed, so library users and
//! tests pay nothing.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::relay::Direction;

/// Install the Prometheus exporter with its HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn session_started() {
    gauge!("cnxmd_active_sessions").increment(1.0);
}

pub fn session_finished() {
    gauge!("cnxmd_active_sessions").decrement(1.0);
}

/// Count a finished session; `outcome` is `completed`, `teardown_timeout`,
/// or a session error kind.
pub fn record_session(outcome: &'static str) {
    counter!("cnxmd_sessions_total", "outcome" => outcome).increment(1);
}

pub fn bytes_relayed(direction: Direction, bytes: u64) {
    counter!("cnxmd_bytes_relayed_total", "direction" => direction.as_str()).increment(bytes);
}

pub fn teardown_timed_out() {
    counter!("cnxmd_teardown_timeouts_total").increment(1);
}

pub fn accept_failed() {
    counter!("cnxmd_accept_errors_total").increment(1);
}
