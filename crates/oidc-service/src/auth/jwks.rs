//! JWKS client for fetching and caching the identity provider's public keys.
//!
//! The JWKS (JSON Web Key Set) location is either configured explicitly or
//! resolved once through OIDC discovery. Keys are cached with a configurable
//! TTL.
//!
//! # Security
//!
//! - Keys are cached to reduce load on the identity provider and improve latency
//! - Cache is invalidated on TTL expiry to pick up key rotations
//! - An unknown `kid` triggers an early refetch, at most once per cooldown
//!   window, so rotated keys are picked up without letting forged `kid`
//!   values hammer the provider
//! - Only keys with a `kid` and `use` of `sig` (or no `use`) are indexed
//! - After a failed refresh, lookups needing the provider fail fast with 503
//!   until the retry backoff has passed

use crate::auth::discovery::discover;
use crate::errors::ApiError;
use crate::observability::metrics::record_jwks_refresh;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Minimum time between refetches triggered by an unknown `kid`.
pub const JWKS_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

/// Default pause after a failed refresh before the provider is retried.
pub const JWKS_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Timeout for discovery and JWKS requests.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type: "RSA", "EC" or "OKP".
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Algorithm the key is intended for.
    #[serde(default)]
    pub alg: Option<String>,

    /// Curve name for EC and OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// EC x coordinate or OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Where the JWKS document lives.
#[derive(Debug, Clone)]
enum JwksLocation {
    /// Explicitly configured JWKS URL.
    Fixed(String),
    /// Resolve `jwks_uri` from the issuer's provider metadata.
    Discover { issuer: String },
}

/// Cached JWKS data with expiry time.
struct CachedJwks {
    /// Map of key ID to JWK.
    keys: HashMap<String, Jwk>,

    /// When the document was fetched.
    fetched_at: Instant,

    /// When this cache entry expires.
    expires_at: Instant,
}

enum CacheLookup {
    Hit(Jwk),
    /// Cache is fresh, key is unknown and the cooldown has not elapsed.
    Miss,
    NeedsRefresh,
}

/// JWKS client for fetching and caching public keys.
pub struct JwksClient {
    location: JwksLocation,

    /// JWKS URL, memoized after the first successful resolution.
    jwks_url: OnceCell<String>,

    /// HTTP client for discovery and JWKS requests.
    http_client: reqwest::Client,

    /// Cached JWKS data.
    cache: Arc<RwLock<Option<CachedJwks>>>,

    /// Serializes refetches so concurrent misses trigger a single request.
    /// Holds the time of the last failed refresh.
    refresh_lock: Mutex<Option<Instant>>,

    /// Cache TTL duration.
    cache_ttl: Duration,

    /// Minimum age of the cache before an unknown `kid` forces a refetch.
    refresh_cooldown: Duration,

    /// How long a failed refresh suppresses further attempts.
    retry_backoff: Duration,
}

impl JwksClient {
    /// Create a JWKS client for a fixed JWKS URL.
    pub fn new(jwks_url: String) -> Self {
        Self::with_ttl(jwks_url, Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS))
    }

    /// Create a JWKS client for a fixed JWKS URL with custom cache TTL.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL of the identity provider's JWKS endpoint
    /// * `cache_ttl` - How long to cache JWKS before refreshing
    pub fn with_ttl(jwks_url: String, cache_ttl: Duration) -> Self {
        Self::build(JwksLocation::Fixed(jwks_url), cache_ttl)
    }

    /// Create a JWKS client that discovers the JWKS URL from the issuer.
    ///
    /// Discovery happens on first use; a failed attempt is retried on the
    /// next one.
    pub fn from_issuer(issuer: String, cache_ttl: Duration) -> Self {
        Self::build(JwksLocation::Discover { issuer }, cache_ttl)
    }

    /// Override the unknown-`kid` refetch cooldown.
    #[must_use]
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    /// Override the backoff after a failed refresh. Zero retries immediately.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    fn build(location: JwksLocation, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "oidc.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            location,
            jwks_url: OnceCell::new(),
            http_client,
            cache: Arc::new(RwLock::new(None)),
            refresh_lock: Mutex::new(None),
            cache_ttl,
            refresh_cooldown: JWKS_REFRESH_COOLDOWN,
            retry_backoff: JWKS_RETRY_BACKOFF,
        }
    }

    /// Get a JWK by key ID.
    ///
    /// Returns the cached JWK if present, fetching the JWKS when the cache is
    /// empty or expired, or when the key is unknown and the cooldown elapsed.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ServiceUnavailable` if the JWKS cannot be fetched.
    /// Returns `ApiError::InvalidToken` if the key ID is not found.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, ApiError> {
        match self.lookup(kid).await {
            CacheLookup::Hit(key) => {
                tracing::debug!(target: "oidc.auth.jwks", kid = %kid, "JWKS cache hit");
                return Ok(key);
            }
            CacheLookup::Miss => {
                tracing::debug!(target: "oidc.auth.jwks", kid = %kid, "Key not found in JWKS cache, refetch on cooldown");
                return Err(unknown_key());
            }
            CacheLookup::NeedsRefresh => {}
        }

        let mut last_failure = self.refresh_lock.lock().await;

        // Another request may have refreshed while this one waited
        match self.lookup(kid).await {
            CacheLookup::Hit(key) => return Ok(key),
            CacheLookup::Miss => return Err(unknown_key()),
            CacheLookup::NeedsRefresh => {}
        }

        self.refresh_with_backoff(&mut last_failure).await?;

        let cache = self.cache.read().await;
        if let Some(key) = cache.as_ref().and_then(|cached| cached.keys.get(kid)) {
            return Ok(key.clone());
        }

        tracing::warn!(target: "oidc.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(unknown_key())
    }

    /// Make sure a non-expired JWKS is cached, fetching it if needed.
    ///
    /// Used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ServiceUnavailable` if discovery or the JWKS fetch fails.
    pub async fn ensure_loaded(&self) -> Result<(), ApiError> {
        if self.is_fresh().await {
            return Ok(());
        }

        let mut last_failure = self.refresh_lock.lock().await;
        if self.is_fresh().await {
            return Ok(());
        }
        self.refresh_with_backoff(&mut last_failure).await
    }

    /// Refresh unless a recent attempt failed. Caller holds `refresh_lock`.
    async fn refresh_with_backoff(
        &self,
        last_failure: &mut Option<Instant>,
    ) -> Result<(), ApiError> {
        if let Some(failed_at) = *last_failure {
            if failed_at.elapsed() < self.retry_backoff {
                tracing::debug!(target: "oidc.auth.jwks", "JWKS refresh failed recently, not retrying yet");
                return Err(provider_unavailable());
            }
        }

        let result = self.refresh_cache().await;
        *last_failure = result.is_err().then(Instant::now);
        result
    }

    async fn is_fresh(&self) -> bool {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .is_some_and(|cached| cached.expires_at > Instant::now())
    }

    async fn lookup(&self, kid: &str) -> CacheLookup {
        let cache = self.cache.read().await;
        match cache.as_ref() {
            Some(cached) if cached.expires_at > Instant::now() => match cached.keys.get(kid) {
                Some(key) => CacheLookup::Hit(key.clone()),
                None if cached.fetched_at.elapsed() < self.refresh_cooldown => CacheLookup::Miss,
                None => CacheLookup::NeedsRefresh,
            },
            _ => CacheLookup::NeedsRefresh,
        }
    }

    /// Resolve the JWKS URL, running discovery on first use.
    async fn resolve_jwks_url(&self) -> Result<&str, ApiError> {
        let url = match &self.location {
            JwksLocation::Fixed(url) => url,
            JwksLocation::Discover { issuer } => {
                self.jwks_url
                    .get_or_try_init(|| async {
                        discover(&self.http_client, issuer)
                            .await
                            .map(|metadata| metadata.jwks_uri)
                    })
                    .await?
            }
        };
        Ok(url.as_str())
    }

    /// Refresh the JWKS cache by fetching from the identity provider.
    #[instrument(skip(self))]
    async fn refresh_cache(&self) -> Result<(), ApiError> {
        let start = Instant::now();
        let result = self.fetch_keys().await;

        match result {
            Ok(keys) => {
                record_jwks_refresh("success", start.elapsed());
                tracing::info!(
                    target: "oidc.auth.jwks",
                    key_count = keys.len(),
                    "JWKS cache refreshed"
                );

                let now = Instant::now();
                let mut cache = self.cache.write().await;
                *cache = Some(CachedJwks {
                    keys,
                    fetched_at: now,
                    expires_at: now + self.cache_ttl,
                });
                Ok(())
            }
            Err(e) => {
                record_jwks_refresh("error", start.elapsed());
                Err(e)
            }
        }
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, Jwk>, ApiError> {
        let jwks_url = self.resolve_jwks_url().await?;
        tracing::debug!(target: "oidc.auth.jwks", url = %jwks_url, "Fetching JWKS");

        let response = self.http_client.get(jwks_url).send().await.map_err(|e| {
            tracing::error!(target: "oidc.auth.jwks", error = %e, "Failed to fetch JWKS");
            provider_unavailable()
        })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "oidc.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(provider_unavailable());
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "oidc.auth.jwks", error = %e, "Failed to parse JWKS response");
            provider_unavailable()
        })?;

        Ok(index_signing_keys(jwks.keys))
    }
}

/// Build the `kid` index, dropping keys that cannot verify signatures.
fn index_signing_keys(keys: Vec<Jwk>) -> HashMap<String, Jwk> {
    keys.into_iter()
        .filter(|key| match key.key_use.as_deref() {
            None | Some("sig") => true,
            Some(other) => {
                tracing::debug!(target: "oidc.auth.jwks", key_use = %other, "Skipping non-signing JWK");
                false
            }
        })
        .filter_map(|key| match key.kid.clone() {
            Some(kid) => Some((kid, key)),
            None => {
                tracing::debug!(target: "oidc.auth.jwks", kty = %key.kty, "Skipping JWK without kid");
                None
            }
        })
        .collect()
}

fn provider_unavailable() -> ApiError {
    ApiError::ServiceUnavailable("Identity provider unavailable".to_string())
}

fn unknown_key() -> ApiError {
    ApiError::InvalidToken("The access token is invalid or expired".to_string())
}
