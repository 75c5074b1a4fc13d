//! Mock OpenID Connect provider
//!
//! A wiremock server publishing a discovery document at
//! `/.well-known/openid-configuration` and a JWKS at `/jwks`. The issuer is
//! the server's base URL.

use crate::crypto_fixtures::TestKeypair;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// JWKS path served by the mock provider.
pub const MOCK_JWKS_PATH: &str = "/jwks";

/// Discovery path served by the mock provider.
pub const MOCK_DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Mock identity provider for integration tests.
pub struct MockIdentityProvider {
    server: MockServer,
}

impl MockIdentityProvider {
    /// Start a provider publishing `keys`.
    pub async fn start(keys: &[&TestKeypair]) -> Self {
        let idp = Self {
            server: MockServer::start().await,
        };
        idp.mount_discovery(None).await;
        idp.mount_jwks(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .await;
        idp
    }

    /// Issuer identifier (the server's base URL).
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    /// Absolute JWKS URL.
    pub fn jwks_uri(&self) -> String {
        format!("{}{}", self.server.uri(), MOCK_JWKS_PATH)
    }

    /// Replace the published keys, e.g. to simulate rotation.
    pub async fn set_keys(&self, keys: &[&TestKeypair]) {
        self.server.reset().await;
        self.mount_discovery(None).await;
        self.mount_jwks(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .await;
    }

    /// Make the JWKS endpoint answer with `status`.
    pub async fn fail_jwks(&self, status: u16) {
        self.server.reset().await;
        self.mount_discovery(None).await;
        self.mount_jwks(ResponseTemplate::new(status)).await;
    }

    /// Publish discovery metadata that advertises a different issuer.
    pub async fn advertise_issuer(&self, issuer: &str, keys: &[&TestKeypair]) {
        self.server.reset().await;
        self.mount_discovery(Some(issuer)).await;
        self.mount_jwks(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .await;
    }

    /// Number of JWKS requests received so far.
    pub async fn jwks_requests(&self) -> usize {
        self.requests_to(MOCK_JWKS_PATH).await
    }

    /// Number of discovery requests received so far.
    pub async fn discovery_requests(&self) -> usize {
        self.requests_to(MOCK_DISCOVERY_PATH).await
    }

    async fn requests_to(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }

    async fn mount_discovery(&self, issuer_override: Option<&str>) {
        let issuer = issuer_override
            .map(ToString::to_string)
            .unwrap_or_else(|| self.issuer());
        Mock::given(method("GET"))
            .and(path(MOCK_DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": issuer,
                "jwks_uri": self.jwks_uri(),
                "id_token_signing_alg_values_supported": ["EdDSA", "ES256", "RS256"]
            })))
            .mount(&self.server)
            .await;
    }

    async fn mount_jwks(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(MOCK_JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}

/// JWKS document for `keys`.
pub fn jwks_document(keys: &[&TestKeypair]) -> Value {
    let keys: Vec<Value> = keys.iter().map(|key| key.jwk_json()).collect();
    json!({ "keys": keys })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_idp_serves_discovery_and_jwks() {
        let keypair = TestKeypair::new(1, "key-1");
        let idp = MockIdentityProvider::start(&[&keypair]).await;

        let metadata: Value = reqwest::get(format!("{}{}", idp.issuer(), MOCK_DISCOVERY_PATH))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(metadata["issuer"], idp.issuer());
        assert_eq!(metadata["jwks_uri"], idp.jwks_uri());

        let jwks: Value = reqwest::get(idp.jwks_uri())
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(jwks["keys"][0]["kid"], "key-1");

        assert_eq!(idp.discovery_requests().await, 1);
        assert_eq!(idp.jwks_requests().await, 1);
    }

    #[tokio::test]
    async fn test_mock_idp_fail_jwks() {
        let keypair = TestKeypair::new(1, "key-1");
        let idp = MockIdentityProvider::start(&[&keypair]).await;
        idp.fail_jwks(503).await;

        let response = reqwest::get(idp.jwks_uri()).await.unwrap();
        assert_eq!(response.status(), 503);
    }
}
