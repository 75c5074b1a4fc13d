//! Builder patterns for test data construction
//!
//! Provides a fluent API for OIDC access token claims.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for OIDC access token claims
///
/// Defaults: subject `test-subject`, `given_name` Ada, `family_name`
/// Lovelace, issued now, expiring in one hour, no audience.
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new(&idp.issuer())
///     .for_user("alice")
///     .with_name("Alice", "Liddell")
///     .with_audience("hello-api")
///     .build();
/// ```
pub struct TestTokenBuilder {
    iss: String,
    sub: String,
    given_name: Option<String>,
    family_name: Option<String>,
    aud: Option<Value>,
    exp: i64,
    iat: Option<i64>,
    nbf: Option<i64>,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new claims builder for `issuer` with defaults
    pub fn new(issuer: &str) -> Self {
        let now = Utc::now();
        Self {
            iss: issuer.to_string(),
            sub: "test-subject".to_string(),
            given_name: Some("Ada".to_string()),
            family_name: Some("Lovelace".to_string()),
            aud: None,
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: Some(now.timestamp()),
            nbf: None,
            extra: Map::new(),
        }
    }

    /// Override the issuer
    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Set the subject
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set both profile name claims
    pub fn with_name(mut self, given_name: &str, family_name: &str) -> Self {
        self.given_name = Some(given_name.to_string());
        self.family_name = Some(family_name.to_string());
        self
    }

    /// Drop the `given_name` claim
    pub fn without_given_name(mut self) -> Self {
        self.given_name = None;
        self
    }

    /// Drop the `family_name` claim
    pub fn without_family_name(mut self) -> Self {
        self.family_name = None;
        self
    }

    /// Set a single-valued `aud`
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = Some(json!(audience));
        self
    }

    /// Set an array-valued `aud`
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = Some(json!(audiences));
        self
    }

    /// Set expiration in seconds from now (negative for expired tokens)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = Some(timestamp);
        self
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Add an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = self.extra;
        claims.insert("iss".to_string(), json!(self.iss));
        claims.insert("sub".to_string(), json!(self.sub));
        claims.insert("exp".to_string(), json!(self.exp));
        if let Some(iat) = self.iat {
            claims.insert("iat".to_string(), json!(iat));
        }
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), json!(nbf));
        }
        if let Some(aud) = self.aud {
            claims.insert("aud".to_string(), aud);
        }
        if let Some(given_name) = self.given_name {
            claims.insert("given_name".to_string(), json!(given_name));
        }
        if let Some(family_name) = self.family_name {
            claims.insert("family_name".to_string(), json!(family_name));
        }
        Value::Object(claims)
    }
}
