//! Test server harness for E2E testing
//!
//! Provides `TestOidcServer` for spawning real service instances in tests.

use crate::mock_idp::MockIdentityProvider;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use oidc_service::config::Config;
use oidc_service::observability::metrics::init_metrics_recorder;
use oidc_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Process-wide metrics handle.
///
/// The Prometheus recorder can only be installed once per process; later
/// callers share the first handle.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Environment for a server that trusts `idp` through discovery.
///
/// Algorithms are restricted to `EdDSA`, the algorithm of the test keypairs.
pub fn idp_vars(idp: &MockIdentityProvider) -> HashMap<String, String> {
    HashMap::from([
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("OIDC_ISSUER_URI".to_string(), idp.issuer()),
        ("JWT_ALGORITHMS".to_string(), "EdDSA".to_string()),
    ])
}

/// Test harness for spawning the OIDC service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// let idp = MockIdentityProvider::start(&[&keypair]).await;
/// let server = TestOidcServer::spawn_for(&idp).await?;
///
/// let response = reqwest::get(format!("{}/health", server.url())).await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestOidcServer {
    addr: SocketAddr,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestOidcServer {
    /// Spawn a server configured for `idp` with default settings.
    pub async fn spawn_for(idp: &MockIdentityProvider) -> Result<Self, anyhow::Error> {
        Self::spawn(idp_vars(idp)).await
    }

    /// Spawn a server from explicit configuration variables.
    ///
    /// The server binds to a random available port on 127.0.0.1 regardless
    /// of `BIND_ADDRESS`.
    pub async fn spawn(vars: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState::from_config(config.clone()));
        let app = routes::build_routes(state, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestOidcServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_fixtures::TestKeypair;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let keypair = TestKeypair::new(1, "key-1");
        let idp = MockIdentityProvider::start(&[&keypair]).await;
        let server = TestOidcServer::spawn_for(&idp).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert!(server.addr().ip().is_loopback());
        assert_eq!(server.config().issuer_uri, idp.issuer());

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }
}
