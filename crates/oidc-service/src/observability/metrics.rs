//! Metrics definitions for the OIDC service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `oidc_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods
//! - `endpoint`: the service's fixed routes plus `/other`
//! - `status`: 3 values (success, error, timeout)
//! - `result`: 3 values (success, rejected, unavailable)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("oidc_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetches go over the network to the identity provider
        .set_buckets_for_metric(
            Matcher::Prefix("oidc_jwks_refresh".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `oidc_http_requests_total`, `oidc_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
///
/// Captures every response, including 401s from the auth middleware and
/// framework-level 404/405.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("oidc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("oidc_http_requests_total",
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

/// Map a request path onto a known route, or `/other`.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/hello" => "/hello",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record a bearer token validation outcome.
///
/// Metric: `oidc_jwt_validations_total`
/// Labels: `result` ("success", "rejected", "unavailable")
pub fn record_jwt_validation(result: &str) {
    counter!("oidc_jwt_validations_total",
        "result" => result.to_string()
    )
    .increment(1);
}

/// Record a JWKS fetch.
///
/// Metric: `oidc_jwks_refresh_total`, `oidc_jwks_refresh_duration_seconds`
/// Labels: `status` ("success", "error")
pub fn record_jwks_refresh(status: &str, duration: Duration) {
    histogram!("oidc_jwks_refresh_duration_seconds").record(duration.as_secs_f64());

    counter!("oidc_jwks_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Recording without an installed recorder goes to the global no-op
    // recorder; these tests only exercise the code paths.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/hello", 200, Duration::from_millis(5));
        record_http_request("GET", "/hello", 401, Duration::from_millis(1));
        record_http_request("GET", "/ready", 503, Duration::from_millis(250));
        record_http_request("POST", "/hello", 405, Duration::from_millis(1));
        record_http_request("GET", "/hello", 408, Duration::from_secs(30));
        record_http_request("GET", "/wp-admin", 404, Duration::from_millis(1));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(299), "success");

        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");

        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(404), "error");
        assert_eq!(categorize_status_code(500), "error");
        assert_eq!(categorize_status_code(503), "error");
    }

    #[test]
    fn test_normalize_endpoint_known_paths() {
        assert_eq!(normalize_endpoint("/hello"), "/hello");
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/ready"), "/ready");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
    }

    #[test]
    fn test_normalize_endpoint_unknown_paths() {
        assert_eq!(normalize_endpoint("/"), "/other");
        assert_eq!(normalize_endpoint("/hello/extra"), "/other");
        assert_eq!(normalize_endpoint("/HELLO"), "/other");
        assert_eq!(normalize_endpoint("/api/v1/me"), "/other");
    }

    #[test]
    fn test_record_jwt_validation() {
        record_jwt_validation("success");
        record_jwt_validation("rejected");
        record_jwt_validation("unavailable");
    }

    #[test]
    fn test_record_jwks_refresh() {
        record_jwks_refresh("success", Duration::from_millis(40));
        record_jwks_refresh("error", Duration::from_secs(10));
    }
}
