//! Authentication middleware for protected routes.
//!
//! Extracts the bearer token from the Authorization header, validates it
//! and injects the claims into request extensions.

use crate::auth::JwtValidator;
use crate::errors::ApiError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// JWT validator with JWKS client.
    pub jwt_validator: Arc<JwtValidator>,
}

/// Authentication middleware that validates JWT tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// The scheme is matched case-insensitively.
///
/// # Response
///
/// - 401 with `WWW-Authenticate: Bearer realm=...` if the header is missing
/// - 401 with `error="invalid_token"` if the header is malformed or the token is invalid
/// - 503 if signing keys cannot be obtained
/// - Otherwise continues with `Claims` in the request extensions
#[instrument(skip(state, req, next), name = "oidc.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let auth_header = req.headers().get(AUTHORIZATION).ok_or_else(|| {
        tracing::debug!(target: "oidc.middleware.auth", "Missing Authorization header");
        ApiError::MissingToken
    })?;

    let auth_header = auth_header.to_str().map_err(|_| {
        tracing::debug!(target: "oidc.middleware.auth", "Authorization header is not visible ASCII");
        ApiError::InvalidToken("Invalid Authorization header format".to_string())
    })?;

    let token = bearer_token(auth_header).ok_or_else(|| {
        tracing::debug!(target: "oidc.middleware.auth", "Invalid Authorization header format");
        ApiError::InvalidToken("Invalid Authorization header format".to_string())
    })?;

    let claims = state.jwt_validator.validate(token).await?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extract the token from a `Bearer <token>` credential.
fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
