//! Crawler core: discovery, admission, dispatch and result assembly.
//!
//! The crawler owns the visited store, the robots cache and the work queue;
//! the fetcher below it is pure HTTP mechanics. Ownership is strictly
//! unidirectional: requests and responses are plain value types, and the
//! only handle callbacks get back into the engine is the discovery sink.

pub mod orchestrator;
pub mod page;
pub mod page_processor;
pub mod sitemap;
pub mod stats;

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use scraper::Selector;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::admission::{AdmissionFilter, AdmissionReason, AdmissionVerdict};
use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::fetcher::{Fetcher, Response};
use crate::limiter::RateLimiter;
use crate::parser::{HtmlCallback, HtmlElement, HtmlHandler, XmlCallback, XmlElement, XmlHandler};
use crate::render::PageRenderer;
use crate::robots::RobotsCache;
use crate::utils::url_utils::host_matches_domain;
use crate::visited::VisitedStore;

pub use page::{ChainHop, PageLink, PageResult};
pub use stats::{CrawlStats, CrawlStatsSnapshot};

/// Invoked once per emitted `PageResult` (hops and terminal pages).
pub type PageCallback = Arc<dyn Fn(&PageResult) + Send + Sync>;

/// Invoked with every final response before parsing.
pub type ResponseCallback = Arc<dyn Fn(&Response) + Send + Sync>;

/// Invoked with the URL and error of every failed page.
pub type ErrorCallback = Arc<dyn Fn(&str, &CrawlError) + Send + Sync>;

/// An admitted unit of work: the fingerprint is already committed to the
/// visited store by the time the item enters the queue.
#[derive(Debug, Clone)]
pub(crate) struct WorkItem {
    pub url: Url,
    pub depth: u16,
    pub fingerprint: u64,
}

/// Registered embedder callbacks. Registration happens before `start`;
/// workers clone the handler lists out so no lock is held across a user
/// callback.
#[derive(Default)]
pub(crate) struct Callbacks {
    html: RwLock<Vec<Arc<HtmlHandler>>>,
    xml: RwLock<Vec<Arc<XmlHandler>>>,
    response: RwLock<Vec<ResponseCallback>>,
    error: RwLock<Vec<ErrorCallback>>,
    page_crawled: RwLock<Option<PageCallback>>,
}

impl Callbacks {
    pub(crate) fn html_handlers(&self) -> Vec<Arc<HtmlHandler>> {
        self.html.read().clone()
    }

    pub(crate) fn xml_handlers(&self) -> Vec<Arc<XmlHandler>> {
        self.xml.read().clone()
    }

    pub(crate) fn response_callbacks(&self) -> Vec<ResponseCallback> {
        self.response.read().clone()
    }

    pub(crate) fn error_callbacks(&self) -> Vec<ErrorCallback> {
        self.error.read().clone()
    }

    pub(crate) fn page_callback(&self) -> Option<PageCallback> {
        self.page_crawled.read().clone()
    }
}

/// Shared crawl state, owned by the `Crawler` handle and every worker.
pub(crate) struct CrawlerInner {
    pub config: CrawlConfig,
    pub fetcher: Fetcher,
    pub visited: VisitedStore,
    pub robots: RobotsCache,
    pub admission: AdmissionFilter,
    pub queue: tokio::sync::Mutex<VecDeque<WorkItem>>,
    pub cancel: CancellationToken,
    pub stats: CrawlStats,
    pub callbacks: Callbacks,
    /// Seed URL, set by the first `start` call; anchors internal-link
    /// classification.
    pub seed: OnceCell<Url>,
    pub renderer: RwLock<Option<Arc<dyn PageRenderer>>>,
}

impl CrawlerInner {
    /// Run admission for a candidate and push it onto the queue when it
    /// passes. Rejections are silent and counted.
    pub(crate) async fn try_enqueue(&self, raw: &str, depth: u16) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if let Some(limit) = self.config.limit()
            && self.stats.pages_emitted() >= limit
        {
            self.stats
                .record_rejection(AdmissionReason::PageLimitReached);
            return false;
        }

        match self
            .admission
            .admit(raw, depth, true, &self.visited, &self.robots, &self.fetcher)
            .await
        {
            AdmissionVerdict::Admitted { url, fingerprint } => {
                debug!("admitted [depth {depth}]: {url}");
                self.queue.lock().await.push_back(WorkItem {
                    url,
                    depth,
                    fingerprint,
                });
                true
            }
            AdmissionVerdict::Rejected(reason) => {
                self.stats.record_rejection(reason);
                false
            }
        }
    }

    /// Whether a URL belongs to the crawl: seed host, or any allowed
    /// domain.
    pub(crate) fn is_internal(&self, url: &Url) -> bool {
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return false;
        };

        if let Some(seed) = self.seed.get()
            && let Some(seed_host) = seed.host_str()
            && host_matches_domain(&host, &seed_host.to_ascii_lowercase())
        {
            return true;
        }

        self.config
            .allowed_domains()
            .is_some_and(|domains| domains.iter().any(|d| host_matches_domain(&host, d)))
    }

    pub(crate) fn emit(&self, result: PageResult) {
        self.stats.record_emitted();
        if let Some(callback) = self.callbacks.page_callback() {
            callback(&result);
        }
    }

    pub(crate) fn report_error(&self, url: &str, error: &CrawlError) {
        for callback in self.callbacks.error_callbacks() {
            callback(url, error);
        }
    }
}

/// The crawl engine handle held by the embedder.
pub struct Crawler {
    inner: Arc<CrawlerInner>,
    handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Crawler {
    /// Construct a crawler from the configuration. Configuration problems
    /// (bad rate-limit rules, unbuildable HTTP client) fail here, never
    /// mid-crawl.
    pub fn new(config: CrawlConfig) -> Result<Self, CrawlError> {
        let limiter = Arc::new(RateLimiter::new());
        for rule in config.limit_rules() {
            limiter.add_rule(rule)?;
        }
        let fetcher = Fetcher::new(&config, Arc::clone(&limiter))?;
        Ok(Self::assemble(config, fetcher))
    }

    /// Construct a crawler over an injected HTTP client (test transports).
    pub fn with_client(
        config: CrawlConfig,
        client: reqwest::Client,
    ) -> Result<Self, CrawlError> {
        let limiter = Arc::new(RateLimiter::new());
        for rule in config.limit_rules() {
            limiter.add_rule(rule)?;
        }
        let fetcher = Fetcher::with_client(&config, Arc::clone(&limiter), client);
        Ok(Self::assemble(config, fetcher))
    }

    fn assemble(config: CrawlConfig, fetcher: Fetcher) -> Self {
        let robots = RobotsCache::new(config.user_agent());
        let admission = AdmissionFilter::from_config(&config);

        Self {
            inner: Arc::new(CrawlerInner {
                config,
                fetcher,
                visited: VisitedStore::new(),
                robots,
                admission,
                queue: tokio::sync::Mutex::new(VecDeque::new()),
                cancel: CancellationToken::new(),
                stats: CrawlStats::default(),
                callbacks: Callbacks::default(),
                seed: OnceCell::new(),
                renderer: RwLock::new(None),
            }),
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Install a headless renderer. Takes effect when `js_rendering` is
    /// enabled in the configuration.
    pub fn set_renderer(&self, renderer: Arc<dyn PageRenderer>) {
        *self.inner.renderer.write() = Some(renderer);
    }

    /// Register a CSS-selector callback, run in insertion order over every
    /// successful HTML page.
    pub fn on_html(
        &self,
        selector: &str,
        callback: impl Fn(&HtmlElement<'_>) + Send + Sync + 'static,
    ) -> Result<(), CrawlError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| CrawlError::Config(format!("invalid selector '{selector}': {e:?}")))?;
        let callback: HtmlCallback = Arc::new(callback);
        self.inner.callbacks.html.write().push(Arc::new(HtmlHandler {
            selector: parsed,
            callback,
        }));
        Ok(())
    }

    /// Register an element-path callback (`/urlset/url/loc`), run over
    /// every successful XML page.
    pub fn on_xml(
        &self,
        path: &str,
        callback: impl Fn(&XmlElement<'_>) + Send + Sync + 'static,
    ) -> Result<(), CrawlError> {
        if !path.starts_with('/') {
            return Err(CrawlError::Config(format!(
                "xml path '{path}' must be absolute"
            )));
        }
        let callback: XmlCallback = Arc::new(callback);
        self.inner.callbacks.xml.write().push(Arc::new(XmlHandler {
            path: path.to_string(),
            callback,
        }));
        Ok(())
    }

    /// Register a callback invoked with every final response.
    pub fn on_response(&self, callback: impl Fn(&Response) + Send + Sync + 'static) {
        self.inner.callbacks.response.write().push(Arc::new(callback));
    }

    /// Register a callback invoked with the URL and error of every failed
    /// page.
    pub fn on_error(&self, callback: impl Fn(&str, &CrawlError) + Send + Sync + 'static) {
        self.inner.callbacks.error.write().push(Arc::new(callback));
    }

    /// Install the per-page callback. One invocation per redirect hop plus
    /// one for the terminal page, hop-ordered within each page.
    pub fn set_on_page_crawled(&self, callback: impl Fn(&PageResult) + Send + Sync + 'static) {
        *self.inner.callbacks.page_crawled.write() = Some(Arc::new(callback));
    }

    /// Seed the crawl and start the worker pool.
    ///
    /// An unparsable or non-http seed is a configuration error; any other
    /// rejection (robots, already visited) is silent, and `wait` returns
    /// once the queue drains.
    pub async fn start(&self, seed_url: &str) -> Result<(), CrawlError> {
        let seed = crate::utils::url_utils::normalize_url(
            seed_url,
            self.inner.config.strip_tracking_params(),
        )
        .map_err(|e| CrawlError::Config(format!("invalid seed URL '{seed_url}': {e}")))?;
        if !matches!(seed.scheme(), "http" | "https") {
            return Err(CrawlError::Config(format!(
                "seed URL must be http(s): {seed_url}"
            )));
        }

        self.inner.seed.get_or_init(|| seed.clone());
        info!("starting crawl from {seed}");

        self.inner.try_enqueue(seed.as_str(), 0).await;
        if self.inner.config.use_sitemap() {
            sitemap::seed_from_sitemap(&self.inner, &seed).await;
        }

        let mut handle = self.handle.lock().await;
        let running = handle.as_ref().is_some_and(|h| !h.is_finished());
        if !running {
            let inner = Arc::clone(&self.inner);
            *handle = Some(tokio::spawn(orchestrator::run(inner)));
        }
        Ok(())
    }

    /// Block until the queue is empty and all workers are idle.
    pub async fn wait(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Cancel the crawl and drain the queue. In-flight fetches abort at
    /// their next suspension point.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        self.wait().await;
    }

    /// Point-in-time crawl counters.
    #[must_use]
    pub fn stats(&self) -> CrawlStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Number of distinct fingerprints committed to the visited store.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.inner.visited.len()
    }

    /// Whether a URL has been visited (post-normalization).
    #[must_use]
    pub fn is_visited(&self, url: &str) -> bool {
        let Ok(normalized) = crate::utils::url_utils::normalize_url(
            url,
            self.inner.config.strip_tracking_params(),
        ) else {
            return false;
        };
        self.inner
            .visited
            .is_visited(crate::visited::fingerprint(&normalized, None))
    }
}
