//! Outgoing request representation.

use reqwest::Method;
use reqwest::header::HeaderMap;
use url::Url;

use crate::visited;

/// A single crawl request.
///
/// Plain value type: it carries no handle back into the engine. Dedup
/// (`check_revisit`) is applied by the crawler's admission path, never by
/// the fetcher.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    /// Distance from the seed; links discovered on this page get depth + 1.
    pub depth: u16,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// When false the admission path skips the already-visited rejection
    /// (robots probes, retries).
    pub check_revisit: bool,
}

impl Request {
    /// A plain GET at the given depth.
    #[must_use]
    pub fn get(url: Url, depth: u16) -> Self {
        Self {
            url,
            method: Method::GET,
            depth,
            headers: HeaderMap::new(),
            body: None,
            check_revisit: true,
        }
    }

    /// Fingerprint of this request for the visited store.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        visited::fingerprint(&self.url, self.body.as_deref())
    }

    /// Host component of the request URL, lowercased. Empty for URLs
    /// without a host (which admission rejects before they reach here).
    #[must_use]
    pub fn host(&self) -> String {
        self.url
            .host_str()
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }
}
