//! HTTP request handlers for the OIDC service.

pub mod health;
pub mod hello;
pub mod metrics;

pub use health::{health_check, readiness_check};
pub use hello::{greeting, hello};
pub use metrics::metrics_handler;
