//! Observability module for the OIDC service.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
