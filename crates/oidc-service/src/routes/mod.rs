//! HTTP routes for the OIDC service.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwksClient, JwtValidator, ValidationPolicy};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Bearer token validator, shared with the auth middleware.
    pub jwt_validator: Arc<JwtValidator>,
}

impl AppState {
    /// Build the state from configuration.
    ///
    /// The JWKS client locates keys through `OIDC_JWKS_URI` when set,
    /// otherwise through discovery on the issuer. No network call is made
    /// here.
    pub fn from_config(config: Config) -> Self {
        let cache_ttl = Duration::from_secs(config.jwks_cache_ttl_seconds);
        let jwks_client = match &config.jwks_uri {
            Some(jwks_uri) => JwksClient::with_ttl(jwks_uri.clone(), cache_ttl),
            None => JwksClient::from_issuer(config.issuer_uri.clone(), cache_ttl),
        }
        .with_retry_backoff(Duration::from_secs(config.jwks_retry_backoff_seconds));
        let jwt_validator = Arc::new(JwtValidator::new(
            Arc::new(jwks_client),
            ValidationPolicy::from_config(&config),
        ));

        Self {
            config,
            jwt_validator,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/hello` - Greeting for the authenticated principal - requires authentication
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (checks signing keys) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - Configurable request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        jwt_validator: state.jwt_validator.clone(),
    });
    let request_timeout = Duration::from_secs(state.config.request_timeout_seconds);

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/hello", get(handlers::hello))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    // Layer order (bottom-to-top execution):
    // 1. TraceLayer - Log request details (innermost)
    // 2. TimeoutLayer - Timeout the request
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(http_metrics_middleware))
}
