//! Upstream address construction.
//!
//! The upstream endpoint is a fixed WebSocket base; the inbound request's
//! path and query are carried over verbatim, except that every `key`
//! parameter is removed and the resolved credential is appended as the
//! single `key` parameter.

use url::Url;

use crate::core::relay::credentials::{ApiKey, KEY_PARAM};

/// Build the upstream WebSocket URL for a relay session.
///
/// All `key` query parameters from the inbound request are stripped (not
/// just the first), remaining parameters keep their order, and the resolved
/// credential is appended last.
pub fn build_target_url(base: &Url, path: &str, query: Option<&str>, key: &ApiKey) -> Url {
    let mut target = base.clone();
    target.set_path(path);
    target.set_query(None);
    {
        let mut pairs = target.query_pairs_mut();
        if let Some(query) = query {
            for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
                if name != KEY_PARAM {
                    pairs.append_pair(&name, &value);
                }
            }
        }
        pairs.append_pair(KEY_PARAM, key.expose());
    }
    target
}

/// Render a target URL with the credential replaced, for logging.
pub fn redacted(target: &Url) -> String {
    let mut safe = target.clone();
    let pairs: Vec<(String, String)> = target
        .query_pairs()
        .map(|(name, value)| {
            if name == KEY_PARAM {
                (name.into_owned(), "***".to_string())
            } else {
                (name.into_owned(), value.into_owned())
            }
        })
        .collect();
    safe.set_query(None);
    {
        let mut out = safe.query_pairs_mut();
        for (name, value) in &pairs {
            out.append_pair(name, value);
        }
    }
    safe.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("wss://generativelanguage.googleapis.com").unwrap()
    }

    #[test]
    fn appends_resolved_key() {
        let key = ApiKey::new("resolved");
        let url = build_target_url(
            &base(),
            "/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent",
            None,
            &key,
        );
        assert_eq!(
            url.as_str(),
            "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent?key=resolved"
        );
    }

    #[test]
    fn strips_inbound_key_and_keeps_other_params() {
        let key = ApiKey::new("resolved");
        let url = build_target_url(&base(), "/ws/session", Some("alt=json&key=client"), &key);
        assert_eq!(
            url.as_str(),
            "wss://generativelanguage.googleapis.com/ws/session?alt=json&key=resolved"
        );
    }

    #[test]
    fn strips_every_inbound_key_occurrence() {
        let key = ApiKey::new("resolved");
        let url = build_target_url(
            &base(),
            "/ws/session",
            Some("key=a&alt=json&key=b&key=c"),
            &key,
        );
        let keys: Vec<String> = url
            .query_pairs()
            .filter(|(name, _)| name == "key")
            .map(|(_, value)| value.into_owned())
            .collect();
        assert_eq!(keys, vec!["resolved".to_string()]);
    }

    #[test]
    fn redacted_hides_the_key() {
        let key = ApiKey::new("resolved-secret");
        let url = build_target_url(&base(), "/ws/session", Some("alt=json"), &key);
        let display = redacted(&url);
        assert!(!display.contains("resolved-secret"));
        assert!(display.contains("key=***"));
        assert!(display.contains("alt=json"));
    }
}
