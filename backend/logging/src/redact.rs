//! Log Redaction Layer
//!
//! Scrubs API keys, bearer tokens and inline base64 image payloads.

use regex::Regex;
use std::sync::LazyLock;

static DATA_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"data:([a-zA-Z0-9.+\-]+/[a-zA-Z0-9.+\-]+);base64,[A-Za-z0-9+/=]+").unwrap());
static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9]{32,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)").unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = DATA_URI_RE.replace_all(input, "data:$1;base64,[REDACTED_IMAGE]");
    API_KEY_RE
        .replace_all(&redacted, "[REDACTED_TOKEN]")
        .into_owned()
}
