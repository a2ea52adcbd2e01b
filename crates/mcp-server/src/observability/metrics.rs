//! Metrics definitions for the MCP resource server.
//!
//! All metrics follow Prometheus naming conventions:
//! - `mcp_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods
//! - `endpoint`: the fixed route table, everything else is `/other`
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: 4 values (allowed, service_unavailable, unauthorized, invalid_token)
//! - `error_type`: bounded by `DiscoveryError` variants

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Build the Prometheus recorder without installing it globally.
///
/// # Errors
///
/// Returns error if histogram buckets are rejected.
pub fn build_metrics_recorder() -> Result<PrometheusBuilder, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("mcp_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Authorization decisions include a key fetch on cold cache
        .set_buckets_for_metric(
            Matcher::Prefix("mcp_auth_decision".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set auth decision buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("mcp_jwks_refresh".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))
}

/// Install the Prometheus recorder and return the handle for serving
/// metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    build_metrics_recorder()?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `mcp_http_requests_total`, `mcp_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("mcp_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("mcp_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed route table.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/.well-known/oauth-authorization-server" => "/.well-known/oauth-authorization-server",
        "/.well-known/openid-configuration" => "/.well-known/openid-configuration",
        "/.well-known/oauth-protected-resource" => "/.well-known/oauth-protected-resource",
        "/manifest.json" => "/manifest.json",
        "/tools" => "/tools",
        "/prompts" => "/prompts",
        "/mcp" => "/mcp",
        "/sse" => "/sse",
        _ => "/other",
    }
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record one authorization gate decision.
///
/// Metric: `mcp_auth_decisions_total`, `mcp_auth_decision_duration_seconds`
/// Labels: `outcome` (`allowed` or the error code)
pub fn record_auth_decision(outcome: &'static str, duration: Duration) {
    histogram!("mcp_auth_decision_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
    counter!("mcp_auth_decisions_total", "outcome" => outcome).increment(1);
}

/// Record a JWKS refresh attempt.
///
/// Metric: `mcp_jwks_refresh_total`, `mcp_jwks_refresh_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_jwks_refresh(status: &'static str, duration: Duration) {
    histogram!("mcp_jwks_refresh_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
    counter!("mcp_jwks_refresh_total", "status" => status).increment(1);
}

/// Record a discovery initialization attempt.
///
/// Metric: `mcp_discovery_init_total`
/// Labels: `status` (success, error), `error_type`
pub fn record_discovery_init(status: &'static str, error_type: Option<&'static str>) {
    counter!("mcp_discovery_init_total",
        "status" => status,
        "error_type" => error_type.unwrap_or("none")
    )
    .increment(1);
}

/// Set whether the authorizer holds discovery metadata.
///
/// Metric: `mcp_authorizer_ready` (1 ready, 0 not ready)
pub fn set_authorizer_ready(ready: bool) {
    gauge!("mcp_authorizer_ready").set(if ready { 1.0 } else { 0.0 });
}
