//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated to allow Prometheus to scrape metrics.
//! Metrics carry no token contents or claim values, only bounded labels.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus text format:
/// ```text
/// # TYPE oidc_http_requests_total counter
/// oidc_http_requests_total{method="GET",endpoint="/hello",status_code="200"} 42
/// ```
#[tracing::instrument(skip_all, name = "oidc.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
