//! User input to target URL resolution.
//!
//! Two entry points share the same first two rules but differ for text that
//! does not look like a host: the home search box turns it into a search
//! query, while the in-session address bar always assumes a destination.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

/// Characters left untouched by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Search engine used by the home search box for non-URL input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEngine {
    /// Host that serves `/search?q=`
    pub host: String,
    /// Extra query pair appended after the query, e.g. `igu=1` to allow framing
    pub extra_param: Option<(String, String)>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self {
            host: "www.google.com".to_string(),
            extra_param: None,
        }
    }
}

impl SearchEngine {
    /// Google with the `igu=1` flag, which lets result pages render inside a frame
    pub fn google_embeddable() -> Self {
        Self {
            extra_param: Some(("igu".to_string(), "1".to_string())),
            ..Self::default()
        }
    }

    /// Build the search URL for a free-text query
    pub fn query_url(&self, text: &str) -> String {
        let mut url = format!(
            "https://{}/search?q={}",
            self.host,
            utf8_percent_encode(text, URI_COMPONENT)
        );
        if let Some((key, value)) = &self.extra_param {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(value);
        }
        url
    }
}

/// Which input surface the text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    /// Home page search box
    Search,
    /// Address bar shown while browsing
    Address,
}

/// Returns true if `text` starts with `http://` or `https://`.
///
/// The scheme match ignores ASCII case, so `HTTP://x` is kept as typed
/// instead of gaining a second `https://` prefix.
pub fn has_explicit_scheme(text: &str) -> bool {
    let lower = text.get(..8).unwrap_or(text).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Returns true if `text` looks like a bare host such as `example.com`
pub fn looks_like_host(text: &str) -> bool {
    text.contains('.') && !text.chars().any(char::is_whitespace)
}

/// Prepend `https://` unless the text already carries a scheme.
///
/// Used by the address bar and by user-added shortcuts. Returns `None` for
/// blank input.
pub fn normalize_address(raw: &str) -> Option<String> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if has_explicit_scheme(text) {
        Some(text.to_string())
    } else {
        Some(format!("https://{}", text))
    }
}

/// Resolve home search box input to a URL.
///
/// Explicit schemes pass through, bare hosts get `https://`, anything else
/// becomes a query against `engine`. Returns `None` for blank input.
pub fn normalize_search(raw: &str, engine: &SearchEngine) -> Option<String> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if has_explicit_scheme(text) {
        Some(text.to_string())
    } else if looks_like_host(text) {
        Some(format!("https://{}", text))
    } else {
        Some(engine.query_url(text))
    }
}

/// Dispatch on the input surface
pub fn normalize(raw: &str, source: InputSource, engine: &SearchEngine) -> Option<String> {
    match source {
        InputSource::Search => normalize_search(raw, engine),
        InputSource::Address => normalize_address(raw),
    }
}
