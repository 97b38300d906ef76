//! Credential resolution for relay upgrade requests.
//!
//! A credential supplied by the client as the `key` query parameter always
//! wins; otherwise the process-wide default from [`ServerConfig`] is used.
//! Resolution happens exactly once per upgrade attempt, before any upstream
//! connection is opened.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::ServerConfig;
use crate::core::relay::RelayError;

/// Query parameter carrying the client-supplied credential.
pub const KEY_PARAM: &str = "key";

/// An opaque upstream API key.
///
/// The wrapped string is zeroized on drop and never printed in full:
/// `Debug` and `Display` both render a fixed placeholder. Use
/// [`ApiKey::expose`] at the single point where the key is appended to the
/// upstream address.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key material.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Resolve the credential for an upgrade request.
///
/// `query` is the raw query string of the inbound request, if any. A
/// non-empty `key` parameter takes priority over the configured default; an
/// empty parameter value counts as absent, matching how browsers submit
/// blank form fields.
pub fn resolve(query: Option<&str>, config: &ServerConfig) -> Result<ApiKey, RelayError> {
    if let Some(query) = query {
        let from_query = url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, value)| name == KEY_PARAM && !value.is_empty())
            .map(|(_, value)| value.into_owned());
        if let Some(key) = from_query {
            return Ok(ApiKey::new(key));
        }
    }

    match config.default_api_key() {
        Some(key) => {
            tracing::debug!("using default API key from configuration");
            Ok(ApiKey::new(key))
        }
        None => Err(RelayError::MissingCredential),
    }
}
