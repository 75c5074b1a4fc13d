//! Quick OIDC service library.
//!
//! An OAuth2/OIDC resource server with one business endpoint, `GET /hello`,
//! which greets the principal named by a validated bearer token.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/jwt.rs -> auth/jwks.rs -> auth/discovery.rs
//!               -> handlers/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Discovery, JWKS cache, JWT validation and claims
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Bearer authentication and HTTP metrics
//! - `models` - Response models
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
