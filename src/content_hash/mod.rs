//! Raw and normalized body hashes for change detection.
//!
//! The raw hash is an xxh3 over the exact body bytes. The normalized hash
//! first strips content that churns between byte-identical page renders
//! (timestamps, analytics and session identifiers, version query params)
//! and collapses whitespace, so two fetches of the "same" page hash equal
//! even when the server stamps each response. Both functions are pure, so
//! hashing a byte-identical input always yields the same value.

use once_cell::sync::Lazy;
use regex::Regex;
use xxhash_rust::xxh3::xxh3_64;

/// ISO-8601-style timestamps, with optional time and zone parts.
static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}(:\d{2})?(\.\d+)?(Z|[+-]\d{2}:?\d{2})?)?")
        .expect("timestamp regex")
});

/// Google Analytics / Tag Manager identifiers.
static ANALYTICS_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(UA-\d{4,}-\d+|G-[A-Z0-9]{6,}|GTM-[A-Z0-9]{4,})\b").expect("analytics regex"));

/// Long hex tokens and UUIDs (session ids, CSRF tokens, build hashes).
static OPAQUE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([0-9a-fA-F]{32,}|[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\b")
        .expect("token regex")
});

/// Cache-busting version parameters in URLs embedded in the body.
static VERSION_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&](v|ver|version|t|ts|rev|build)=[^\s\x22'&<>]+").expect("version regex"));

/// xxh3 of the exact body bytes.
#[must_use]
pub fn raw_hash(body: &[u8]) -> u64 {
    xxh3_64(body)
}

/// xxh3 of the normalized body text.
#[must_use]
pub fn normalized_hash(text: &str) -> u64 {
    xxh3_64(normalize_content(text).as_bytes())
}

/// Strip volatile content and collapse whitespace.
#[must_use]
pub fn normalize_content(text: &str) -> String {
    let text = TIMESTAMP.replace_all(text, "");
    let text = ANALYTICS_ID.replace_all(&text, "");
    let text = OPAQUE_TOKEN.replace_all(&text, "");
    let text = VERSION_PARAM.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_idempotent() {
        let body = b"<html><body>stable content</body></html>";
        assert_eq!(raw_hash(body), raw_hash(body));

        let text = "stable   content";
        assert_eq!(normalized_hash(text), normalized_hash(text));
    }

    #[test]
    fn volatile_content_does_not_change_normalized_hash() {
        let a = "Generated at 2024-01-15T10:30:00Z with session 0123456789abcdef0123456789abcdef0123 ok";
        let b = "Generated at 2025-06-02 08:01:59 with session fedcba9876543210fedcba9876543210fedc ok";
        assert_eq!(normalized_hash(a), normalized_hash(b));
        assert_ne!(raw_hash(a.as_bytes()), raw_hash(b.as_bytes()));
    }

    #[test]
    fn version_params_and_tracking_ids_are_stripped() {
        let a = r#"<script src="/app.js?v=1.2.3"></script> GTM-AB12CD"#;
        let b = r#"<script src="/app.js?v=9.9.9"></script> GTM-ZZ99XX"#;
        assert_eq!(normalized_hash(a), normalized_hash(b));
    }

    #[test]
    fn real_content_changes_are_detected() {
        assert_ne!(
            normalized_hash("the old headline"),
            normalized_hash("the new headline")
        );
    }
}
