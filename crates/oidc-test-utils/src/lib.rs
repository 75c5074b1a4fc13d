//! # OIDC Test Utilities
//!
//! Shared test utilities for the Quick OIDC service.
//!
//! This crate provides:
//! - Crypto fixtures (Ed25519, P-256 and RSA keypairs that sign tokens)
//! - Claims builders (`TestTokenBuilder`)
//! - A mock identity provider serving discovery metadata and a JWKS
//! - Server test harness (`TestOidcServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oidc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let keypair = TestKeypair::new(1, "key-1");
//!     let idp = MockIdentityProvider::start(&[&keypair]).await;
//!     let server = TestOidcServer::spawn_for(&idp).await?;
//!
//!     let token = keypair.sign(
//!         &TestTokenBuilder::new(&idp.issuer())
//!             .with_name("Ada", "Lovelace")
//!             .build(),
//!     );
//!     // GET {server.url()}/hello with `Authorization: Bearer {token}`
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_idp;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_idp::*;
pub use server_harness::*;
pub use token_builders::*;
