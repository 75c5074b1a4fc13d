//! Authentication module for the OIDC service.
//!
//! Validates bearer tokens issued by an OpenID Connect provider.
//!
//! # Components
//!
//! - `discovery` - Provider metadata discovery (resolves `jwks_uri`)
//! - `jwks` - JWKS client for fetching and caching public keys
//! - `jwt` - JWT validation using cached JWKS keys
//! - `claims` - Claims of a validated token

pub mod claims;
pub mod discovery;
pub mod jwks;
pub mod jwt;

pub use claims::Claims;
pub use jwks::JwksClient;
pub use jwt::{JwtValidator, ValidationPolicy};
