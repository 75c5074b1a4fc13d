//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks that signing keys can be loaded

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Loads the JWKS (running discovery first if needed) unless a fresh copy
/// is already cached. Returns 200 if ready, 503 if not.
///
/// Error messages are generic; the actual cause is logged.
#[tracing::instrument(skip_all, name = "oidc.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = state.jwt_validator.jwks_client().ensure_loaded().await {
        tracing::warn!(target: "oidc.health", error = %e, "Readiness check failed: signing keys unavailable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                jwks: "unavailable",
                error: Some("Service dependencies unavailable".to_string()),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            jwks: "healthy",
            error: None,
        }),
    )
}
