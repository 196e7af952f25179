//! bluesnake: a production web crawl engine.
//!
//! Two layers: a low-level [`fetcher::Fetcher`] that executes single HTTP
//! requests with manual redirect following, per-domain rate limiting and an
//! optional on-disk response cache; and a high-level [`crawler::Crawler`]
//! that owns URL discovery, deduplication, admission policy (robots.txt,
//! domain filters, depth), concurrent dispatch and per-page result
//! assembly.
//!
//! ```rust,no_run
//! use bluesnake::{CrawlConfig, Crawler};
//!
//! # async fn run() -> Result<(), bluesnake::CrawlError> {
//! let config = CrawlConfig::builder()
//!     .max_depth(2)
//!     .parallelism(8)
//!     .build()?;
//!
//! let crawler = Crawler::new(config)?;
//! crawler.set_on_page_crawled(|page| {
//!     println!("{} {} {}", page.status, page.url, page.title);
//! });
//! crawler.start("https://example.com").await?;
//! crawler.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod config;
pub mod content_hash;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod limiter;
pub mod parser;
pub mod render;
pub mod response_cache;
pub mod robots;
pub mod utils;
pub mod visited;

pub use admission::{AdmissionFilter, AdmissionReason, AdmissionVerdict};
pub use config::{CrawlConfig, CrawlConfigBuilder};
pub use crawler::{
    ChainHop, CrawlStatsSnapshot, Crawler, PageCallback, PageLink, PageResult,
};
pub use error::CrawlError;
pub use fetcher::{Fetcher, RedirectDecision, RedirectHop, Request, Response};
pub use limiter::{LimitRule, RateLimiter};
pub use parser::{HtmlElement, ParsedPage, XmlElement};
pub use render::{PageRenderer, RenderedPage, RenderingConfig};
pub use response_cache::ResponseCache;
pub use robots::{RobotsCache, RobotsMode};
pub use visited::{VisitedStore, fingerprint};
