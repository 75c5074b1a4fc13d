//! Claims extracted from a validated OIDC access token.
//!
//! Registered claims that the validator relies on are typed. Everything else
//! (profile claims such as `given_name`, `aud`, `scope`, ...) is kept as raw
//! JSON and read through [`Claims::claim_as_string`].
//!
//! Debug output never includes claim values: `sub` is redacted and only the
//! names of the remaining claims are printed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Claims of a validated access token.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer. Always present after validation.
    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Subject - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// All other claims, by name.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extra_names: Vec<&str> = self.extra.keys().map(String::as_str).collect();
        f.debug_struct("Claims")
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("iat", &self.iat)
            .field("extra", &extra_names)
            .finish()
    }
}

impl Claims {
    /// Read a claim as a string.
    ///
    /// Absent and `null` claims yield `None`. Strings are returned as-is,
    /// numbers and booleans in their display form, arrays and objects as
    /// compact JSON.
    pub fn claim_as_string(&self, name: &str) -> Option<String> {
        match name {
            "iss" => Some(self.iss.clone()),
            "sub" => self.sub.clone(),
            "exp" => Some(self.exp.to_string()),
            "iat" => self.iat.map(|iat| iat.to_string()),
            _ => self.extra.get(name).and_then(value_as_string),
        }
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
