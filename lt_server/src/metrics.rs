//! Prometheus metrics for auth flows and presence.
//!
//! Recording is always safe: without an installed exporter the `metrics`
//! macros are no-ops.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use lt_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/auth/login", 200);
//! metrics::online_users(10);
//! ```

use lets_talk::auth::CodePurpose;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Increment login attempts counter, labelled by outcome
/// (`success`, `not_found`, `unverified`, `bad_password`, `error`).
pub fn login_attempts_total(outcome: &'static str) {
    metrics::counter!("login_attempts_total", "outcome" => outcome).increment(1);
}

/// Increment one-time codes sent counter.
pub fn codes_issued_total(purpose: CodePurpose) {
    metrics::counter!("one_time_codes_issued_total", "purpose" => purpose.to_string())
        .increment(1);
}

/// Increment one-time code delivery failures counter.
pub fn code_delivery_failures_total(purpose: CodePurpose) {
    metrics::counter!("one_time_code_delivery_failures_total", "purpose" => purpose.to_string())
        .increment(1);
}

// ============================================================================
// Presence Metrics
// ============================================================================

/// Set current active WebSocket connections count.
pub fn websocket_connections_active(count: usize) {
    metrics::gauge!("websocket_connections_active").set(count as f64);
}

/// Increment total WebSocket connections counter.
pub fn websocket_connections_total() {
    metrics::counter!("websocket_connections_total").increment(1);
}

/// Increment WebSocket messages received counter.
pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received").increment(1);
}

/// Set current online users count.
pub fn online_users(count: usize) {
    metrics::gauge!("online_users").set(count as f64);
}

/// Increment rate limit hits counter.
pub fn rate_limit_hits_total(window: &'static str) {
    metrics::counter!("rate_limit_hits_total", "window" => window).increment(1);
}
