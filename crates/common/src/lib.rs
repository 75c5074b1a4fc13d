//! Common utilities shared across Quick OIDC crates.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (size limits, key ID extraction, iat validation)
pub mod jwt;
