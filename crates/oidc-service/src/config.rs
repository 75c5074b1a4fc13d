//! OIDC service configuration.
//!
//! Configuration is loaded from environment variables. The identity provider
//! is located either by its issuer URI (OIDC discovery) or by an explicit
//! JWKS URI.

use common::jwt::{parse_signing_algorithm, DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use jsonwebtoken::Algorithm;
use reqwest::Url;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default JWKS cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default pause after a failed JWKS refresh before the provider is retried.
pub const DEFAULT_JWKS_RETRY_BACKOFF_SECONDS: u64 = 5;

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Default graceful shutdown drain period in seconds.
pub const DEFAULT_SHUTDOWN_DRAIN_SECONDS: u64 = 30;

/// Default signing algorithm allowlist.
pub const DEFAULT_JWT_ALGORITHMS: &str = "RS256";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// OIDC service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Expected token issuer; also the base for OIDC discovery.
    pub issuer_uri: String,

    /// Explicit JWKS endpoint. When set, discovery is skipped.
    pub jwks_uri: Option<String>,

    /// Accepted `aud` values. Empty disables audience validation.
    pub audiences: Vec<String>,

    /// Accepted JWS signing algorithms.
    pub algorithms: Vec<Algorithm>,

    /// Clock skew tolerance in seconds for exp/nbf/iat validation.
    pub jwt_clock_skew_seconds: i64,

    /// How long fetched JWKS keys are trusted before refetching.
    pub jwks_cache_ttl_seconds: u64,

    /// Seconds a failed JWKS refresh short-circuits later lookups (0 disables).
    pub jwks_retry_backoff_seconds: u64,

    /// Per-request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Seconds to keep draining connections after a shutdown signal.
    pub shutdown_drain_seconds: u64,

    /// Log output format.
    pub log_format: LogFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid URL configuration: {0}")]
    InvalidUrl(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWT algorithm configuration: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let issuer_uri = vars
            .get("OIDC_ISSUER_URI")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OIDC_ISSUER_URI".to_string()))?
            .trim()
            .to_string();
        validate_http_url("OIDC_ISSUER_URI", &issuer_uri)?;

        let jwks_uri = match vars.get("OIDC_JWKS_URI").map(|v| v.trim()) {
            Some(value) if !value.is_empty() => {
                validate_http_url("OIDC_JWKS_URI", value)?;
                Some(value.to_string())
            }
            _ => None,
        };

        let audiences = vars
            .get("OIDC_AUDIENCES")
            .map(|v| split_list(v))
            .unwrap_or_default();

        let algorithm_names = vars
            .get("JWT_ALGORITHMS")
            .map(String::as_str)
            .unwrap_or(DEFAULT_JWT_ALGORITHMS);
        let algorithms = split_list(algorithm_names)
            .iter()
            .map(|name| {
                parse_signing_algorithm(name)
                    .map_err(|e| ConfigError::InvalidAlgorithm(format!("JWT_ALGORITHMS: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if algorithms.is_empty() {
            return Err(ConfigError::InvalidAlgorithm(
                "JWT_ALGORITHMS must name at least one algorithm".to_string(),
            ));
        }

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let jwks_cache_ttl_seconds = parse_seconds(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
            false,
        )?;

        let jwks_retry_backoff_seconds = parse_seconds(
            vars,
            "JWKS_RETRY_BACKOFF_SECONDS",
            DEFAULT_JWKS_RETRY_BACKOFF_SECONDS,
            true,
        )?;

        let request_timeout_seconds = parse_seconds(
            vars,
            "REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
            false,
        )?;

        // Zero drain is allowed and skips the drain period
        let shutdown_drain_seconds = parse_seconds(
            vars,
            "SHUTDOWN_DRAIN_SECONDS",
            DEFAULT_SHUTDOWN_DRAIN_SECONDS,
            true,
        )?;

        let log_format = match vars.get("LOG_FORMAT").map(|v| v.trim().to_ascii_lowercase()) {
            None => LogFormat::Text,
            Some(v) if v == "text" => LogFormat::Text,
            Some(v) if v == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidLogFormat(format!(
                    "LOG_FORMAT must be 'text' or 'json', got '{}'",
                    other
                )))
            }
        };

        Ok(Config {
            bind_address,
            issuer_uri,
            jwks_uri,
            audiences,
            algorithms,
            jwt_clock_skew_seconds,
            jwks_cache_ttl_seconds,
            jwks_retry_backoff_seconds,
            request_timeout_seconds,
            shutdown_drain_seconds,
            log_format,
        })
    }
}

/// Split a comma-separated list, dropping blank entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::from_str(value).map_err(|e| {
        ConfigError::InvalidUrl(format!("{} must be a valid URL, got '{}': {}", name, value, e))
    })?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name,
            url.scheme()
        )));
    }

    Ok(())
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    allow_zero: bool,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{} must be a valid non-negative integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 && !allow_zero {
        return Err(ConfigError::InvalidDuration(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}
