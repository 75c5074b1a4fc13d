//! Greeting handler.
//!
//! Builds `"Hello <given_name> <family_name>"` from the validated token's
//! claims. A missing claim leaves its segment blank; the handler never fails.

use crate::auth::Claims;
use axum::Extension;

/// Build the greeting for a validated principal.
pub fn greeting(claims: &Claims) -> String {
    let given_name = claims.claim_as_string("given_name").unwrap_or_default();
    let family_name = claims.claim_as_string("family_name").unwrap_or_default();
    format!("Hello {given_name} {family_name}")
}

/// Handler for GET /hello
///
/// Requires the auth middleware; responds `200 OK` with a plain-text body.
pub async fn hello(Extension(claims): Extension<Claims>) -> String {
    greeting(&claims)
}
