//! Concurrency-safe visited set keyed by request fingerprints.
//!
//! `visit_if_not_visited` is the single synchronization point that prevents
//! duplicate fetches: when two workers race on the same fingerprint, exactly
//! one observes `was_visited == false`. The set is lock-free (`DashSet`), so
//! the test-and-set is a short critical section that is never held across an
//! await point.

use dashmap::DashSet;
use url::Url;
use xxhash_rust::xxh3::Xxh3;

/// Stable 64-bit fingerprint over the canonical URL string plus the request
/// body, when present.
///
/// The method is intentionally ignored: dedup is URL-level. Callers that
/// want method-scoped dedup incorporate the method into the URL-equivalent
/// key themselves.
#[must_use]
pub fn fingerprint(url: &Url, body: Option<&[u8]>) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(url.as_str().as_bytes());
    if let Some(body) = body {
        hasher.update(body);
    }
    hasher.digest()
}

/// Set of fingerprints for URLs the crawl has committed to fetching.
///
/// Mutated by the crawler only; the fetcher never touches it (redirect
/// destinations are marked by the crawler after the response returns, which
/// removes the historical race between the transport's redirect handler and
/// the discovery path).
#[derive(Debug, Default)]
pub struct VisitedStore {
    seen: DashSet<u64>,
}

impl VisitedStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Whether the fingerprint has been admitted already.
    #[must_use]
    pub fn is_visited(&self, fp: u64) -> bool {
        self.seen.contains(&fp)
    }

    /// Mark a fingerprint visited unconditionally.
    pub fn visit(&self, fp: u64) {
        self.seen.insert(fp);
    }

    /// Atomic test-and-set. Returns `true` when the fingerprint was already
    /// visited; among concurrent callers for the same fingerprint exactly
    /// one gets `false`.
    pub fn visit_if_not_visited(&self, fp: u64) -> bool {
        !self.seen.insert(fp)
    }

    /// Number of distinct fingerprints admitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_body_sensitive() {
        let url = Url::parse("https://example.com/a").unwrap();
        assert_eq!(fingerprint(&url, None), fingerprint(&url, None));
        assert_ne!(fingerprint(&url, None), fingerprint(&url, Some(b"body")));

        let other = Url::parse("https://example.com/b").unwrap();
        assert_ne!(fingerprint(&url, None), fingerprint(&other, None));
    }

    #[test]
    fn test_and_set_semantics() {
        let store = VisitedStore::new();
        let fp = 42u64;

        assert!(!store.is_visited(fp));
        assert!(!store.visit_if_not_visited(fp));
        assert!(store.visit_if_not_visited(fp));
        assert!(store.is_visited(fp));
        assert_eq!(store.len(), 1);
    }
}
