//! Bearer token authentication integration tests.
//!
//! Spawns the real router against a mock identity provider and exercises
//! every rejection path of the token validator through `GET /hello`.

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use oidc_test_utils::{
    forge_token, idp_vars, MockIdentityProvider, TestKeypair, TestOidcServer, TestTokenBuilder,
};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Test Fixture
// =============================================================================

struct AuthFixture {
    idp: MockIdentityProvider,
    keypair: TestKeypair,
    server: TestOidcServer,
}

impl AuthFixture {
    async fn spawn() -> Result<Self> {
        Self::spawn_with(HashMap::new()).await
    }

    /// Spawn with extra configuration on top of the discovery defaults.
    async fn spawn_with(overrides: HashMap<&str, &str>) -> Result<Self> {
        let keypair = TestKeypair::new(1, "key-1");
        let idp = MockIdentityProvider::start(&[&keypair]).await;

        let mut vars = idp_vars(&idp);
        for (name, value) in overrides {
            vars.insert(name.to_string(), value.to_string());
        }
        let server = TestOidcServer::spawn(vars).await?;

        Ok(Self {
            idp,
            keypair,
            server,
        })
    }

    fn claims(&self) -> TestTokenBuilder {
        TestTokenBuilder::new(&self.idp.issuer())
    }

    fn valid_token(&self) -> String {
        self.keypair.sign(&self.claims().build())
    }

    async fn get_hello(&self, authorization: Option<&str>) -> Result<reqwest::Response> {
        let mut request = reqwest::Client::new().get(format!("{}/hello", self.server.url()));
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        Ok(request.send().await?)
    }

    async fn get_hello_with_token(&self, token: &str) -> Result<reqwest::Response> {
        self.get_hello(Some(&format!("Bearer {}", token))).await
    }
}

fn www_authenticate(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn assert_invalid_token(response: reqwest::Response) -> Result<()> {
    assert_eq!(response.status(), 401);
    assert_eq!(
        www_authenticate(&response),
        "Bearer realm=\"quick-oidc\", error=\"invalid_token\""
    );
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    Ok(())
}

// =============================================================================
// Header handling
// =============================================================================

/// Test that /hello returns 401 without credentials.
#[tokio::test]
async fn test_hello_requires_auth() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;

    let response = fixture.get_hello(None).await?;

    assert_eq!(response.status(), 401);
    assert_eq!(www_authenticate(&response), "Bearer realm=\"quick-oidc\"");
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    Ok(())
}

/// Test that a non-Bearer scheme is rejected.
#[tokio::test]
async fn test_hello_rejects_basic_auth() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;

    let response = fixture.get_hello(Some("Basic dXNlcjpwYXNz")).await?;

    assert_invalid_token(response).await
}

/// Test that `Bearer` with no token is rejected.
#[tokio::test]
async fn test_hello_rejects_empty_bearer() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;

    let response = fixture.get_hello(Some("Bearer ")).await?;

    assert_eq!(response.status(), 401);

    Ok(())
}

/// Test that the scheme is matched case-insensitively.
#[tokio::test]
async fn test_hello_accepts_lowercase_scheme() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let token = fixture.valid_token();

    let response = fixture
        .get_hello(Some(&format!("bearer {}", token)))
        .await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

// =============================================================================
// Token validation
// =============================================================================

/// Test that a valid token is accepted.
#[tokio::test]
async fn test_hello_with_valid_token() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;

    let response = fixture.get_hello_with_token(&fixture.valid_token()).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "Hello Ada Lovelace");

    Ok(())
}

/// Test that expired tokens are rejected.
#[tokio::test]
async fn test_hello_rejects_expired_token() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let token = fixture.keypair.sign(
        &fixture
            .claims()
            .expires_in(-3600)
            .issued_at(Utc::now().timestamp() - 7200)
            .build(),
    );

    let response = fixture.get_hello_with_token(&token).await?;

    assert_invalid_token(response).await
}

/// Test that a token expired by less than the clock skew is still accepted.
#[tokio::test]
async fn test_hello_accepts_token_expired_within_clock_skew() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let token = fixture
        .keypair
        .sign(&fixture.claims().expires_in(-20).build());

    let response = fixture.get_hello_with_token(&token).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

/// Test that tokens issued in the future beyond the clock skew are rejected.
#[tokio::test]
async fn test_hello_rejects_future_iat_token() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let token = fixture.keypair.sign(
        &fixture
            .claims()
            .expires_in(7200)
            .issued_at(Utc::now().timestamp() + 3600)
            .build(),
    );

    let response = fixture.get_hello_with_token(&token).await?;

    assert_invalid_token(response).await
}

/// Test that tokens not yet valid are rejected.
#[tokio::test]
async fn test_hello_rejects_future_nbf_token() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let token = fixture
        .keypair
        .sign(&fixture.claims().not_before_in(3600).build());

    let response = fixture.get_hello_with_token(&token).await?;

    assert_invalid_token(response).await
}

/// Test that tokens from another issuer are rejected.
#[tokio::test]
async fn test_hello_rejects_wrong_issuer() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let token = fixture.keypair.sign(
        &fixture
            .claims()
            .issued_by("https://evil.example.com")
            .build(),
    );

    let response = fixture.get_hello_with_token(&token).await?;

    assert_invalid_token(response).await
}

/// Test that tokens without `iss` are rejected.
#[tokio::test]
async fn test_hello_rejects_missing_issuer() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let mut claims = fixture.claims().build();
    if let Some(object) = claims.as_object_mut() {
        object.remove("iss");
    }
    let token = fixture.keypair.sign(&claims);

    let response = fixture.get_hello_with_token(&token).await?;

    assert_invalid_token(response).await
}

/// Test that a token without `aud` is rejected once audiences are configured.
#[tokio::test]
async fn test_hello_rejects_missing_audience_when_configured() -> Result<()> {
    let fixture =
        AuthFixture::spawn_with(HashMap::from([("OIDC_AUDIENCES", "hello-api")])).await?;
    let claims = fixture.claims().build();
    assert!(claims.get("aud").is_none());

    let response = fixture
        .get_hello_with_token(&fixture.keypair.sign(&claims))
        .await?;

    assert_invalid_token(response).await
}

/// Test audience enforcement when audiences are configured.
#[tokio::test]
async fn test_hello_enforces_configured_audience() -> Result<()> {
    let fixture =
        AuthFixture::spawn_with(HashMap::from([("OIDC_AUDIENCES", "hello-api")])).await?;

    let no_aud = fixture.keypair.sign(&fixture.claims().build());
    assert_invalid_token(fixture.get_hello_with_token(&no_aud).await?).await?;

    let wrong_aud = fixture
        .keypair
        .sign(&fixture.claims().with_audience("other-api").build());
    assert_invalid_token(fixture.get_hello_with_token(&wrong_aud).await?).await?;

    let right_aud = fixture
        .keypair
        .sign(&fixture.claims().with_audiences(&["other-api", "hello-api"]).build());
    let response = fixture.get_hello_with_token(&right_aud).await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

/// Test that any audience is accepted when none is configured.
#[tokio::test]
async fn test_hello_ignores_audience_when_not_configured() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let token = fixture
        .keypair
        .sign(&fixture.claims().with_audience("anything").build());

    let response = fixture.get_hello_with_token(&token).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

// =============================================================================
// Algorithm handling
// =============================================================================

/// Test that unsigned `alg: none` tokens are rejected.
#[tokio::test]
async fn test_hello_rejects_alg_none() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let token = forge_token(
        &json!({"alg": "none", "typ": "JWT", "kid": "key-1"}),
        &fixture.claims().build(),
    );

    let response = fixture.get_hello_with_token(&token).await?;

    assert_invalid_token(response).await
}

/// Test that HMAC tokens are rejected even with a known kid.
#[tokio::test]
async fn test_hello_rejects_hs256_token() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("key-1".to_string());
    let token = encode(
        &header,
        &fixture.claims().build(),
        &EncodingKey::from_secret(b"shared-secret"),
    )?;

    let response = fixture.get_hello_with_token(&token).await?;

    assert_invalid_token(response).await
}

/// Test that an algorithm missing from the allowlist is rejected.
#[tokio::test]
async fn test_hello_rejects_algorithm_not_allowlisted() -> Result<()> {
    // Default allowlist is RS256 only; test keys are Ed25519
    let fixture = AuthFixture::spawn_with(HashMap::from([("JWT_ALGORITHMS", "RS256")])).await?;

    let response = fixture.get_hello_with_token(&fixture.valid_token()).await?;

    assert_invalid_token(response).await?;
    assert_eq!(fixture.idp.jwks_requests().await, 0);

    Ok(())
}

/// Test that a token signed by the wrong key for its kid is rejected.
#[tokio::test]
async fn test_hello_rejects_forged_signature() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    // Attacker key claiming the published kid
    let attacker = TestKeypair::new(99, "key-1");
    let token = attacker.sign(&fixture.claims().build());

    let response = fixture.get_hello_with_token(&token).await?;

    assert_invalid_token(response).await
}

/// Test that oversized tokens are rejected.
#[tokio::test]
async fn test_hello_rejects_oversized_token() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let oversized_token = "a".repeat(9000);

    let response = fixture.get_hello_with_token(&oversized_token).await?;

    assert_invalid_token(response).await?;
    assert_eq!(fixture.idp.jwks_requests().await, 0);

    Ok(())
}

// =============================================================================
// Key lookup
// =============================================================================

/// Test that tokens with an unknown kid are rejected.
#[tokio::test]
async fn test_hello_rejects_unknown_kid() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    let unpublished = TestKeypair::new(2, "unpublished-key");
    let token = unpublished.sign(&fixture.claims().build());

    let response = fixture.get_hello_with_token(&token).await?;

    assert_invalid_token(response).await
}

/// Test that unknown kids inside the cooldown window do not refetch the JWKS.
#[tokio::test]
async fn test_unknown_kid_refetch_is_rate_limited() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;

    let response = fixture.get_hello_with_token(&fixture.valid_token()).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(fixture.idp.jwks_requests().await, 1);

    let unpublished = TestKeypair::new(2, "unpublished-key");
    for _ in 0..5 {
        let token = unpublished.sign(&fixture.claims().build());
        let response = fixture.get_hello_with_token(&token).await?;
        assert_eq!(response.status(), 401);
    }

    assert_eq!(fixture.idp.jwks_requests().await, 1);

    Ok(())
}

/// Test that rotated keys are picked up once the cache expires.
#[tokio::test]
async fn test_rotated_key_accepted_after_cache_expiry() -> Result<()> {
    let fixture =
        AuthFixture::spawn_with(HashMap::from([("JWKS_CACHE_TTL_SECONDS", "1")])).await?;

    let response = fixture.get_hello_with_token(&fixture.valid_token()).await?;
    assert_eq!(response.status(), 200);

    let rotated = TestKeypair::new(2, "key-2");
    fixture.idp.set_keys(&[&fixture.keypair, &rotated]).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let token = rotated.sign(&fixture.claims().with_name("Grace", "Hopper").build());
    let response = fixture.get_hello_with_token(&token).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "Hello Grace Hopper");

    Ok(())
}

/// Test that an unreachable JWKS yields 503, not 401.
#[tokio::test]
async fn test_hello_jwks_unavailable_returns_503() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    fixture.idp.fail_jwks(500).await;

    let response = fixture.get_hello_with_token(&fixture.valid_token()).await?;

    assert_eq!(response.status(), 503);
    assert!(response.headers().get("www-authenticate").is_none());
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

    Ok(())
}

/// Test that requests arriving right after a failed JWKS fetch fail fast
/// instead of each retrying the provider.
#[tokio::test]
async fn test_jwks_failure_backs_off_before_retry() -> Result<()> {
    let fixture = AuthFixture::spawn().await?;
    fixture.idp.fail_jwks(500).await;
    let token = fixture.valid_token();

    for _ in 0..3 {
        let response = fixture.get_hello_with_token(&token).await?;
        assert_eq!(response.status(), 503);
    }
    assert_eq!(fixture.idp.jwks_requests().await, 1);

    Ok(())
}
