//! Metrics collection and Prometheus exporter for veil.
//!
//! Session counts, auth outcomes, error rates and pipeline latencies.
//! Nothing here counts bytes.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize Prometheus metrics exporter.
///
/// Starts an HTTP server on the given address to expose metrics.
/// Returns an error message if binding fails.
pub fn init_prometheus(listen: &str) -> Result<(), String> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| format!("invalid metrics listen address: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install prometheus exporter: {}", e))?;

    Ok(())
}

// ============================================================================
// Metric Names
// ============================================================================

/// Total number of TCP connections accepted.
pub const CONNECTIONS_TOTAL: &str = "veil_connections_total";
/// Number of currently active connections.
pub const CONNECTIONS_ACTIVE: &str = "veil_connections_active";
/// Total number of connections rejected (max connections).
pub const CONNECTIONS_REJECTED_TOTAL: &str = "veil_connections_rejected_total";
/// Connection duration histogram (seconds).
pub const CONNECTION_DURATION_SECONDS: &str = "veil_connection_duration_seconds";
/// Tunnel sessions by protocol.
pub const SESSIONS_TOTAL: &str = "veil_sessions_total";
/// Plain HTTP requests served (decoy, subscription, not found).
pub const HTTP_REQUESTS_TOTAL: &str = "veil_http_requests_total";
/// Total number of successful authentications.
pub const AUTH_SUCCESS_TOTAL: &str = "veil_auth_success_total";
/// Total number of failed authentications.
pub const AUTH_FAILURE_TOTAL: &str = "veil_auth_failure_total";
/// Total number of errors by type.
pub const ERRORS_TOTAL: &str = "veil_errors_total";
/// DoH lookup duration histogram (seconds).
pub const DNS_RESOLVE_DURATION_SECONDS: &str = "veil_dns_resolve_duration_seconds";
/// Upstream TCP connect duration histogram (seconds).
pub const UPSTREAM_CONNECT_DURATION_SECONDS: &str = "veil_upstream_connect_duration_seconds";
/// TLS handshake duration histogram (seconds).
pub const TLS_HANDSHAKE_DURATION_SECONDS: &str = "veil_tls_handshake_duration_seconds";

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a new connection accepted.
#[inline]
pub fn record_connection_accepted() {
    counter!(CONNECTIONS_TOTAL).increment(1);
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a connection closed.
#[inline]
pub fn record_connection_closed(duration_secs: f64) {
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(CONNECTION_DURATION_SECONDS).record(duration_secs);
}

/// Record a rejected connection (reason: "max_connections").
#[inline]
pub fn record_connection_rejected(reason: &'static str) {
    counter!(CONNECTIONS_REJECTED_TOTAL, "reason" => reason).increment(1);
}

/// Record a classified tunnel session ("vless" or "trojan").
#[inline]
pub fn record_session(protocol: &'static str) {
    counter!(SESSIONS_TOTAL, "protocol" => protocol).increment(1);
}

/// Record a plain HTTP request by route ("decoy", "subscription", "not_found").
#[inline]
pub fn record_http_request(route: &'static str) {
    counter!(HTTP_REQUESTS_TOTAL, "route" => route).increment(1);
}

/// Record successful authentication.
#[inline]
pub fn record_auth_success() {
    counter!(AUTH_SUCCESS_TOTAL).increment(1);
}

/// Record failed authentication.
#[inline]
pub fn record_auth_failure() {
    counter!(AUTH_FAILURE_TOTAL).increment(1);
}

/// Record an error by type.
#[inline]
pub fn record_error(error_type: &'static str) {
    counter!(ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Record DoH lookup duration.
#[inline]
pub fn record_dns_resolve_duration(duration_secs: f64) {
    histogram!(DNS_RESOLVE_DURATION_SECONDS).record(duration_secs);
}

/// Record upstream connect duration.
#[inline]
pub fn record_upstream_connect_duration(duration_secs: f64) {
    histogram!(UPSTREAM_CONNECT_DURATION_SECONDS).record(duration_secs);
}

/// Record TLS handshake duration.
#[inline]
pub fn record_tls_handshake_duration(duration_secs: f64) {
    histogram!(TLS_HANDSHAKE_DURATION_SECONDS).record(duration_secs);
}

// ============================================================================
// Error Type Constants (re-exported from veil-core)
// ============================================================================

pub use veil_core::{
    ERROR_AUTH, ERROR_CONFIG, ERROR_CONNECT, ERROR_HANDSHAKE, ERROR_IO, ERROR_PANIC,
    ERROR_PROTOCOL, ERROR_RESOLVE, ERROR_TIMEOUT, ERROR_TLS_HANDSHAKE,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_listen_address() {
        let err = init_prometheus("not-an-addr").unwrap_err();
        assert!(err.contains("invalid metrics listen address"));
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_connection_accepted();
        record_session("vless");
        record_error(ERROR_RESOLVE);
        record_connection_closed(0.5);
    }
}
