//! OIDC service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Error messages returned to clients are intentionally generic to avoid
//! leaking internal details. Actual errors are logged server-side.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Bearer challenge realm advertised in `WWW-Authenticate`.
pub const BEARER_REALM: &str = "quick-oidc";

/// OIDC service error type.
///
/// Maps to HTTP status codes:
/// - MissingToken, InvalidToken: 401 Unauthorized
/// - ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::MissingToken | ApiError::InvalidToken(_) => 401,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Full authentication is required to access this resource".to_string(),
            ),
            ApiError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            ApiError::ServiceUnavailable(reason) => {
                // Log actual reason server-side
                tracing::warn!(target: "oidc.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // RFC 6750: no error code when the request carried no credentials
        let challenge = match &self {
            ApiError::MissingToken => Some(format!("Bearer realm=\"{}\"", BEARER_REALM)),
            ApiError::InvalidToken(_) => Some(format!(
                "Bearer realm=\"{}\", error=\"invalid_token\"",
                BEARER_REALM
            )),
            ApiError::ServiceUnavailable(_) => None,
        };

        if let Some(challenge) = challenge {
            if let Ok(header_value) = HeaderValue::from_str(&challenge) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, header_value);
            }
        }

        response
    }
}
