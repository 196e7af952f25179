//! Error types for the crawl engine.
//!
//! Workers never let an error escape to the embedder as a panic: every
//! failure is converted into a `PageResult` outcome or surfaced through the
//! `on_error` callback. The variants here are the full taxonomy of things
//! that can go wrong between admission and result emission.

use std::time::Duration;

/// Errors produced by the fetcher and crawler.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// Invalid configuration, fatal at construction time
    #[error("invalid configuration: {0}")]
    Config(String),

    /// DNS, TCP, TLS or timeout failure. Retry-eligible.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The pre-request hook returned false; no bytes left the process.
    #[error("request aborted before execution")]
    AbortedBeforeRequest,

    /// The post-headers hook returned false; the body was never read.
    #[error("request aborted after headers (status {status})")]
    AbortedAfterHeaders { status: u16 },

    /// The redirect chain exceeded the hop limit.
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),

    /// A redirect callback aborted the chain.
    #[error("redirect aborted: {0}")]
    RedirectCallback(String),

    /// Malformed content that could not be processed. The raw body is
    /// preserved by the caller when this is reported.
    #[error("parse failure: {0}")]
    Parse(String),

    /// Crawl-wide cancellation. Terminal, not reported as a page error.
    #[error("crawl cancelled")]
    Cancelled,

    /// Response cache I/O failure.
    #[error("cache error: {0}")]
    Cache(#[from] std::io::Error),
}

impl CrawlError {
    /// Whether the retry policy applies to this error.
    ///
    /// Only transport failures are retried; hook aborts, redirect-loop
    /// overruns and cancellation are terminal on first occurrence.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Exponential backoff with jitter for retry attempts.
///
/// Formula: `base * 2^(attempt-1) * (1 ± 20%)`, capped at 30 seconds.
#[must_use]
pub fn retry_backoff(attempt: u8) -> Duration {
    use rand::Rng;

    const BASE_DELAY_MS: u64 = 1000;
    const MAX_DELAY_MS: u64 = 30_000;
    const JITTER_PERCENT: f64 = 0.2;

    let exp_delay = BASE_DELAY_MS.saturating_mul(1 << attempt.saturating_sub(1).min(5));
    let jitter = rand::rng().random_range(-JITTER_PERCENT..=JITTER_PERCENT);
    let jittered = (exp_delay as f64 * (1.0 + jitter)) as u64;

    Duration::from_millis(jittered.min(MAX_DELAY_MS))
}
