//! Per-page result types emitted to the embedder.

use serde::Serialize;

/// A link found on a page, with its anchor text and surrounding context.
#[derive(Debug, Clone, Serialize)]
pub struct PageLink {
    /// Absolute, normalized URL.
    pub url: String,
    /// Anchor text, whitespace-collapsed.
    pub anchor: String,
    /// Text of the nearest enclosing block element, truncated.
    pub context: String,
    /// Raw `rel` attribute when present (`nofollow`, `sponsored`, ...).
    pub rel: Option<String>,
}

/// One hop of a redirect chain as reported in a final `PageResult`.
#[derive(Debug, Clone, Serialize)]
pub struct ChainHop {
    /// URL that answered with the 3xx.
    pub url: String,
    pub status: u16,
    /// Raw `Location` value.
    pub location: String,
}

/// The per-URL record emitted to the embedder.
///
/// One `PageResult` is emitted for every redirect hop (status only, no
/// content) followed by one for the terminal page, strictly in hop order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageResult {
    /// Final URL for terminal results, the hop URL for hop results.
    pub url: String,
    /// HTTP status; 0 when the transport never produced one.
    pub status: u16,
    /// Distance from the seed.
    pub depth: u16,
    pub title: String,
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub meta_description: Option<String>,
    pub canonical: Option<String>,
    /// Links whose host belongs to the crawl (seed host or allow list).
    pub internal_links: Vec<PageLink>,
    pub external_links: Vec<PageLink>,
    /// xxh3 of the exact body bytes.
    pub raw_hash: u64,
    /// xxh3 of the normalized body text.
    pub normalized_hash: u64,
    /// The redirect chain that led to this page, in hop order.
    pub redirect_chain: Vec<ChainHop>,
    /// Terminal error, when the page could not be fetched or was aborted.
    pub error: Option<String>,
    /// Set when a hook aborted the request; the body was never read.
    pub aborted: bool,
}

impl PageResult {
    /// Result for one redirect hop: status only, no content or links.
    #[must_use]
    pub fn hop(url: impl Into<String>, status: u16, depth: u16) -> Self {
        Self {
            url: url.into(),
            status,
            depth,
            ..Self::default()
        }
    }

    /// Terminal result for a failed fetch.
    #[must_use]
    pub fn failed(url: impl Into<String>, status: u16, depth: u16, error: String) -> Self {
        Self {
            url: url.into(),
            status,
            depth,
            error: Some(error),
            ..Self::default()
        }
    }
}
