//! Bearer token primitives for an OIDC resource server.
//!
//! Everything here runs on the untrusted token before, or just after, the
//! signature check:
//!
//! - [`extract_kid`] bounds the token size and reads the header `kid` so the
//!   matching key can be picked from the identity provider's JWKS
//! - [`validate_iat`] refuses tokens minted in the future
//! - [`parse_signing_algorithm`] turns configured algorithm names into the
//!   allowlist, refusing shared-secret algorithms
//!
//! All rejections surface as the same message; the reason is only logged at
//! debug level under the `common.jwt` target.
//!
//! ```rust,ignore
//! use common::jwt::{extract_kid, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let kid = extract_kid(bearer)?;
//! // ... look up the JWK and verify the signature ...
//! if let Some(iat) = claims.iat {
//!     validate_iat(iat, DEFAULT_CLOCK_SKEW)?;
//! }
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on the encoded token length, enforced before decoding.
///
/// Identity provider access tokens with profile claims are usually 1-2 KiB;
/// 8 KiB still fits tokens carrying large group or role lists.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Clock skew tolerated on `exp`, `nbf` and `iat` unless configured otherwise.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Largest clock skew the configuration accepts.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Reasons a bearer token is refused before or after signature verification.
///
/// Every variant displays the same text so responses never reveal which check
/// failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Not three dot-separated segments, or a header that is not base64url JSON.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Header has no usable `kid`, so no JWK can be selected.
    #[error("The access token is invalid or expired")]
    MissingKid,

    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

/// An algorithm name that cannot go on the allowlist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported signing algorithm: {0}")]
pub struct UnsupportedAlgorithm(pub String);

/// Read the `kid` header parameter of a compact JWS.
///
/// The signature is not checked here. The returned value only selects a
/// candidate key from the provider's JWKS.
///
/// # Errors
///
/// - `TokenTooLarge` when the token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` when the token is not `header.payload.signature` or the
///   header does not decode to JSON
/// - `MissingKid` when `kid` is absent, empty or not a string
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Bearer token over size limit"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let header = decode_header_segment(token)?;

    match header.get("kid") {
        Some(Value::String(kid)) if !kid.is_empty() => Ok(kid.clone()),
        other => {
            tracing::debug!(target: "common.jwt", present = other.is_some(), "Bearer token has no usable kid");
            Err(JwtValidationError::MissingKid)
        }
    }
}

/// Decode the JOSE header of a compact token into JSON.
fn decode_header_segment(token: &str) -> Result<Value, JwtValidationError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        tracing::debug!(target: "common.jwt", "Bearer token is not a three-segment JWS");
        return Err(JwtValidationError::MalformedToken);
    };

    let bytes = URL_SAFE_NO_PAD.decode(header).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "JWS header is not base64url");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "JWS header is not JSON");
        JwtValidationError::MalformedToken
    })
}

/// Refuse an `iat` later than now plus `clock_skew`.
///
/// # Errors
///
/// Returns `IatTooFarInFuture` for tokens issued beyond the tolerated skew.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    validate_iat_at(iat, clock_skew, chrono::Utc::now().timestamp())
}

/// [`validate_iat`] against a fixed `now`, for boundary tests.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    let latest_accepted = now.saturating_add(skew);

    if iat <= latest_accepted {
        return Ok(());
    }

    tracing::debug!(
        target: "common.jwt",
        iat,
        now,
        latest_accepted,
        "Bearer token issued in the future"
    );
    Err(JwtValidationError::IatTooFarInFuture)
}

/// Map a configured JWS algorithm name onto an allowlist entry.
///
/// Names are case-sensitive, as in the JOSE registry. RSA (`RS*`, `PS*`),
/// ECDSA (`ES256`, `ES384`) and `EdDSA` are accepted. `HS*` and `none` are
/// refused: a public identity provider's keys cannot verify them.
///
/// # Errors
///
/// Returns `UnsupportedAlgorithm` carrying the rejected name.
pub fn parse_signing_algorithm(name: &str) -> Result<Algorithm, UnsupportedAlgorithm> {
    const ALLOWED: [(&str, Algorithm); 9] = [
        ("RS256", Algorithm::RS256),
        ("RS384", Algorithm::RS384),
        ("RS512", Algorithm::RS512),
        ("PS256", Algorithm::PS256),
        ("PS384", Algorithm::PS384),
        ("PS512", Algorithm::PS512),
        ("ES256", Algorithm::ES256),
        ("ES384", Algorithm::ES384),
        ("EdDSA", Algorithm::EdDSA),
    ];

    let name = name.trim();
    ALLOWED
        .iter()
        .find(|(allowed, _)| *allowed == name)
        .map(|(_, alg)| *alg)
        .ok_or_else(|| UnsupportedAlgorithm(name.to_string()))
}

/// Raw public key bytes from the `x` member of an OKP JWK.
///
/// # Errors
///
/// Returns `base64::DecodeError` if `x` is not unpadded base64url.
pub fn decode_ed25519_public_key_jwk(x_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(x_b64url)
}
