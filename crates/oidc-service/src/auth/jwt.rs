//! JWT validation for OIDC access tokens.
//!
//! Validates incoming JWTs using public keys fetched from the identity
//! provider's JWKS endpoint.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only allowlisted asymmetric algorithms are accepted (`none` and `HS*` never)
//! - The JWK key type and `alg` must match the token's algorithm
//! - `exp`/`nbf` are validated with clock skew leeway, `iat` may not be in the future
//! - `iss` is required and must match; `aud` is checked when audiences are configured
//! - Generic error messages prevent information leakage

use crate::auth::claims::Claims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::config::Config;
use crate::errors::ApiError;
use crate::observability::metrics::record_jwt_validation;
use common::jwt::{decode_ed25519_public_key_jwk, extract_kid, validate_iat};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

const INVALID_TOKEN_MESSAGE: &str = "The access token is invalid or expired";

/// What a token must satisfy besides a valid signature.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    /// Required `iss` value.
    pub issuer: String,

    /// Accepted `aud` values. Empty disables the audience check.
    pub audiences: Vec<String>,

    /// Accepted header `alg` values.
    pub algorithms: Vec<Algorithm>,

    /// Leeway for `exp`/`nbf` and allowed future drift of `iat`.
    pub clock_skew: Duration,
}

impl ValidationPolicy {
    /// Build the policy from service configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            issuer: config.issuer_uri.clone(),
            audiences: config.audiences.clone(),
            algorithms: config.algorithms.clone(),
            clock_skew: Duration::from_secs(config.jwt_clock_skew_seconds.unsigned_abs()),
        }
    }
}

/// JWT validator backed by the identity provider's JWKS.
pub struct JwtValidator {
    /// JWKS client for fetching public keys.
    jwks_client: Arc<JwksClient>,

    policy: ValidationPolicy,
}

impl JwtValidator {
    /// Create a new JWT validator.
    pub fn new(jwks_client: Arc<JwksClient>, policy: ValidationPolicy) -> Self {
        Self {
            jwks_client,
            policy,
        }
    }

    /// The JWKS client used for key lookups.
    pub fn jwks_client(&self) -> &JwksClient {
        &self.jwks_client
    }

    /// Validate a JWT and return the claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Extract kid from header to find the correct key
    /// 3. Header algorithm must be allowlisted
    /// 4. Fetch public key from JWKS and check it fits the algorithm
    /// 5. Verify signature, `exp`, `nbf`, `iss` and (if configured) `aud`
    /// 6. Validate `iat` with clock skew tolerance
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidToken` for all validation failures with a generic
    /// message to prevent information leakage. Returns `ApiError::ServiceUnavailable`
    /// if the signing keys cannot be obtained.
    #[instrument(skip_all, name = "oidc.auth.validate")]
    pub async fn validate(&self, token: &str) -> Result<Claims, ApiError> {
        let result = self.validate_inner(token).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(ApiError::ServiceUnavailable(_)) => "unavailable",
            Err(_) => "rejected",
        };
        record_jwt_validation(outcome);
        result
    }

    async fn validate_inner(&self, token: &str) -> Result<Claims, ApiError> {
        // 1. Extract kid from JWT header (includes size check via common::jwt)
        let kid = extract_kid(token).map_err(|e| {
            tracing::debug!(target: "oidc.auth.jwt", error = ?e, "Token kid extraction failed");
            invalid_token()
        })?;

        // 2. Header algorithm against the allowlist
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "oidc.auth.jwt", error = %e, "Token header decoding failed");
            invalid_token()
        })?;
        if !self.policy.algorithms.contains(&header.alg) {
            tracing::debug!(target: "oidc.auth.jwt", alg = ?header.alg, "Token algorithm not allowed");
            return Err(invalid_token());
        }

        // 3. Fetch public key from JWKS
        let jwk = self.jwks_client.get_key(&kid).await?;

        // 4. Verify signature and registered claims
        let claims = verify_token(token, &jwk, header.alg, &self.policy)?;

        // 5. Validate iat claim with clock skew tolerance using common utility
        if let Some(iat) = claims.iat {
            if let Err(e) = validate_iat(iat, self.policy.clock_skew) {
                tracing::debug!(target: "oidc.auth.jwt", error = ?e, "Token iat validation failed");
                return Err(invalid_token());
            }
        }

        tracing::debug!(target: "oidc.auth.jwt", "Token validated successfully");
        Ok(claims)
    }
}

/// Verify JWT signature and registered claims.
fn verify_token(
    token: &str,
    jwk: &Jwk,
    alg: Algorithm,
    policy: &ValidationPolicy,
) -> Result<Claims, ApiError> {
    let decoding_key = build_decoding_key(jwk, alg)?;

    let mut validation = Validation::new(alg);
    validation.leeway = policy.clock_skew.as_secs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_issuer(&[policy.issuer.as_str()]);
    if policy.audiences.is_empty() {
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_aud = false;
    } else {
        // set_audience alone lets a token without `aud` through
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.set_audience(&policy.audiences);
    }

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(target: "oidc.auth.jwt", error = %e, "Token verification failed");
        invalid_token()
    })?;

    Ok(token_data.claims)
}

/// Build a decoding key from a JWK, checking it fits the token's algorithm.
fn build_decoding_key(jwk: &Jwk, alg: Algorithm) -> Result<DecodingKey, ApiError> {
    if let Some(jwk_alg) = &jwk.alg {
        if Algorithm::from_str(jwk_alg).ok() != Some(alg) {
            tracing::warn!(target: "oidc.auth.jwt", jwk_alg = %jwk_alg, token_alg = ?alg, "JWK algorithm does not match token");
            return Err(invalid_token());
        }
    }

    let (expected_kty, expected_crv) = match alg {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => ("RSA", None),
        Algorithm::ES256 => ("EC", Some("P-256")),
        Algorithm::ES384 => ("EC", Some("P-384")),
        Algorithm::EdDSA => ("OKP", Some("Ed25519")),
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            tracing::warn!(target: "oidc.auth.jwt", alg = ?alg, "Symmetric algorithm refused");
            return Err(invalid_token());
        }
    };

    if jwk.kty != expected_kty {
        tracing::warn!(target: "oidc.auth.jwt", kty = %jwk.kty, expected = expected_kty, "Unexpected JWK key type");
        return Err(invalid_token());
    }
    if let (Some(expected), Some(crv)) = (expected_crv, jwk.crv.as_deref()) {
        if crv != expected {
            tracing::warn!(target: "oidc.auth.jwt", crv = %crv, expected = expected, "Unexpected JWK curve");
            return Err(invalid_token());
        }
    }

    let key = match expected_kty {
        "RSA" => {
            let n = required_component(jwk, "n", jwk.n.as_deref())?;
            let e = required_component(jwk, "e", jwk.e.as_deref())?;
            DecodingKey::from_rsa_components(n, e)
        }
        "EC" => {
            let x = required_component(jwk, "x", jwk.x.as_deref())?;
            let y = required_component(jwk, "y", jwk.y.as_deref())?;
            DecodingKey::from_ec_components(x, y)
        }
        _ => {
            let x = required_component(jwk, "x", jwk.x.as_deref())?;
            let public_key_bytes = decode_ed25519_public_key_jwk(x).map_err(|e| {
                tracing::error!(target: "oidc.auth.jwt", error = %e, "Invalid public key encoding");
                invalid_token()
            })?;
            Ok(DecodingKey::from_ed_der(&public_key_bytes))
        }
    };

    key.map_err(|e| {
        tracing::error!(target: "oidc.auth.jwt", error = %e, "Invalid JWK key material");
        invalid_token()
    })
}

fn required_component<'a>(
    jwk: &Jwk,
    name: &str,
    value: Option<&'a str>,
) -> Result<&'a str, ApiError> {
    value.ok_or_else(|| {
        tracing::error!(
            target: "oidc.auth.jwt",
            kid = ?jwk.kid,
            component = name,
            "JWK missing key component"
        );
        invalid_token()
    })
}

fn invalid_token() -> ApiError {
    ApiError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
}
