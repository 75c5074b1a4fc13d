//! OIDC provider metadata discovery.
//!
//! Resolves the JWKS endpoint of an identity provider from its issuer
//! identifier. Candidate metadata locations are tried in order:
//!
//! 1. `{issuer}/.well-known/openid-configuration`
//! 2. `{origin}/.well-known/openid-configuration{path}` (issuers with a path)
//! 3. `{origin}/.well-known/oauth-authorization-server{path}`
//!
//! The `issuer` advertised by the metadata must equal the configured issuer
//! exactly, otherwise the document is rejected.

use crate::errors::ApiError;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

/// Subset of the provider metadata document the service needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier advertised by the provider.
    pub issuer: String,

    /// Location of the provider's JSON Web Key Set.
    pub jwks_uri: String,
}

/// Errors raised while discovering provider metadata.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid issuer URI: {0}")]
    InvalidIssuer(String),

    #[error("Provider metadata unavailable for issuer {0}")]
    Unavailable(String),

    #[error("Metadata issuer {actual} does not match configured issuer {expected}")]
    IssuerMismatch { expected: String, actual: String },
}

impl From<DiscoveryError> for ApiError {
    fn from(err: DiscoveryError) -> Self {
        ApiError::ServiceUnavailable(err.to_string())
    }
}

/// Build the ordered list of metadata URLs for an issuer.
///
/// # Errors
///
/// Returns `DiscoveryError::InvalidIssuer` if the issuer is not an absolute
/// http(s) URL.
pub fn candidate_urls(issuer: &str) -> Result<Vec<String>, DiscoveryError> {
    let url = Url::parse(issuer).map_err(|e| DiscoveryError::InvalidIssuer(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(DiscoveryError::InvalidIssuer(issuer.to_string()));
    }

    let origin = url.origin().ascii_serialization();
    let path = url.path().trim_end_matches('/');

    let mut candidates = vec![format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    )];
    if !path.is_empty() {
        candidates.push(format!("{origin}/.well-known/openid-configuration{path}"));
    }
    candidates.push(format!(
        "{origin}/.well-known/oauth-authorization-server{path}"
    ));

    Ok(candidates)
}

/// Compare issuer identifiers exactly, trailing slash included.
///
/// Must agree with the `iss` check in token validation.
pub fn issuers_match(configured: &str, advertised: &str) -> bool {
    configured == advertised
}

/// Discover provider metadata for `issuer`.
///
/// # Errors
///
/// - `InvalidIssuer` if the issuer cannot be parsed
/// - `IssuerMismatch` if a metadata document advertises a different issuer
/// - `Unavailable` if no candidate location returned a usable document
#[instrument(skip(http_client), name = "oidc.auth.discovery")]
pub async fn discover(
    http_client: &reqwest::Client,
    issuer: &str,
) -> Result<ProviderMetadata, DiscoveryError> {
    for url in candidate_urls(issuer)? {
        tracing::debug!(target: "oidc.auth.discovery", url = %url, "Fetching provider metadata");

        let response = match http_client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(target: "oidc.auth.discovery", url = %url, error = %e, "Provider metadata request failed");
                continue;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                target: "oidc.auth.discovery",
                url = %url,
                status = %response.status(),
                "No provider metadata at candidate location"
            );
            continue;
        }

        let metadata: ProviderMetadata = match response.json().await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(target: "oidc.auth.discovery", url = %url, error = %e, "Failed to parse provider metadata");
                continue;
            }
        };

        if !issuers_match(issuer, &metadata.issuer) {
            tracing::error!(
                target: "oidc.auth.discovery",
                expected = %issuer,
                actual = %metadata.issuer,
                "Provider metadata issuer mismatch"
            );
            return Err(DiscoveryError::IssuerMismatch {
                expected: issuer.to_string(),
                actual: metadata.issuer,
            });
        }

        tracing::info!(
            target: "oidc.auth.discovery",
            jwks_uri = %metadata.jwks_uri,
            "Provider metadata discovered"
        );
        return Ok(metadata);
    }

    Err(DiscoveryError::Unavailable(issuer.to_string()))
}
