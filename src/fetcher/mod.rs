//! Low-level HTTP fetcher with a manual redirect state machine.
//!
//! The transport (`reqwest` with redirects disabled) performs exactly one
//! round-trip per call; the loop in [`Fetcher::fetch`] owns every hop so the
//! crawler can observe and report each intermediate URL. The fetcher also
//! consults the per-domain rate limiter and the optional on-disk response
//! cache, applies the body-size limit, and transparently decodes gzip
//! bodies.
//!
//! The fetcher is pure HTTP mechanics: it never touches the visited store
//! and applies no crawl policy. Admission, dedup and robots handling all
//! live above it, in the crawler.

pub mod redirect;
pub mod request;
pub mod response;

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::MultiGzDecoder;
use log::{debug, warn};
use reqwest::Method;
use reqwest::header::{
    ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderValue,
    LOCATION,
};
use url::Url;

use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::limiter::RateLimiter;
use crate::response_cache::ResponseCache;
use crate::utils::constants::REDIRECT_LIMIT;

pub use redirect::RedirectDecision;
pub use request::Request;
pub use response::{RedirectHop, Response};

/// Consulted before any bytes leave the process; `false` aborts the fetch.
pub type PreRequestHook = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Consulted once the final status and headers are known, before the body
/// is read; `false` aborts without reading the body.
pub type PostHeadersHook = Arc<dyn Fn(&Request, u16, &HeaderMap) -> bool + Send + Sync>;

/// Consulted per redirect hop with a probe request for the destination.
pub type RedirectHook = Arc<dyn Fn(&Request, u16) -> RedirectDecision + Send + Sync>;

/// Executes single crawl requests with manual redirect following.
pub struct Fetcher {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    cache: Option<ResponseCache>,
    max_body_size: u64,
    pre_request: Option<PreRequestHook>,
    post_headers: Option<PostHeadersHook>,
    on_redirect: Option<RedirectHook>,
}

impl Fetcher {
    /// Build a fetcher from the crawl configuration.
    ///
    /// The underlying client has redirects disabled (the manual loop owns
    /// them), the configured timeout, and advertises gzip support.
    pub fn new(config: &CrawlConfig, limiter: Arc<RateLimiter>) -> Result<Self, CrawlError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.request_timeout_secs()))
            .user_agent(config.user_agent())
            .default_headers(default_headers)
            .build()
            .map_err(|e| CrawlError::Config(format!("http client: {e}")))?;

        Ok(Self::with_client(config, limiter, client))
    }

    /// Build a fetcher over an injected client (test transports).
    #[must_use]
    pub fn with_client(
        config: &CrawlConfig,
        limiter: Arc<RateLimiter>,
        client: reqwest::Client,
    ) -> Self {
        let cache = config
            .cache_dir()
            .map(|dir| ResponseCache::new(dir.clone(), config.cache_ttl()));

        Self {
            client,
            limiter,
            cache,
            max_body_size: config.max_body_size(),
            pre_request: None,
            post_headers: None,
            on_redirect: None,
        }
    }

    pub fn set_pre_request_hook(&mut self, hook: PreRequestHook) {
        self.pre_request = Some(hook);
    }

    pub fn set_post_headers_hook(&mut self, hook: PostHeadersHook) {
        self.post_headers = Some(hook);
    }

    pub fn set_redirect_hook(&mut self, hook: RedirectHook) {
        self.on_redirect = Some(hook);
    }

    /// Execute a request, following up to [`REDIRECT_LIMIT`] redirect hops.
    ///
    /// The returned [`Response`] carries the final body plus the ordered
    /// chain of every hop taken.
    pub async fn fetch(&self, request: Request) -> Result<Response, CrawlError> {
        if let Some(hook) = &self.pre_request
            && !hook(&request)
        {
            return Err(CrawlError::AbortedBeforeRequest);
        }

        let cache_eligible = self.cache_eligible(&request);
        if cache_eligible
            && let Some(response) = self.cache_lookup(request.clone()).await?
        {
            return Ok(response);
        }

        let original_url = request.url.clone();
        let mut current = request;
        let mut chain: Vec<RedirectHop> = Vec::new();

        loop {
            let permit = self.limiter.acquire(&current.host()).await;

            let http_response = match self.round_trip(&current).await {
                Ok(r) => r,
                Err(e) => return Err(e.into()),
            };

            let status = http_response.status().as_u16();
            let headers = http_response.headers().clone();

            let location = if (300..400).contains(&status) {
                headers
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            } else {
                None
            };

            let follow = match location {
                Some(ref loc) => {
                    let destination = current.url.join(loc).map_err(|e| {
                        CrawlError::Parse(format!("unresolvable Location '{loc}': {e}"))
                    })?;

                    match self.redirect_decision(&current, status, &destination) {
                        RedirectDecision::Abort(msg) => {
                            return Err(CrawlError::RedirectCallback(msg));
                        }
                        // The current 3xx response becomes the final one.
                        RedirectDecision::Stop => None,
                        RedirectDecision::Follow => Some(destination),
                    }
                }
                None => None,
            };

            if let Some(destination) = follow {
                if chain.len() >= REDIRECT_LIMIT {
                    return Err(CrawlError::TooManyRedirects(REDIRECT_LIMIT));
                }

                debug!("redirect {status}: {} -> {destination}", current.url);
                chain.push(RedirectHop {
                    source: current.url.clone(),
                    status,
                    headers,
                    location: location.unwrap_or_default(),
                });

                let next = redirect::next_request(&current, status, destination);
                drop(http_response);
                if let Some(permit) = permit {
                    permit.release().await;
                }
                current = next;
                continue;
            }

            if let Some(hook) = &self.post_headers
                && !hook(&current, status, &headers)
            {
                return Err(CrawlError::AbortedAfterHeaders { status });
            }

            let raw = self.read_body(http_response).await?;
            let body = maybe_gunzip(&current.url, &headers, raw);

            let response = Response {
                status,
                body,
                headers,
                request: current,
                redirect_chain: chain,
            };

            if cache_eligible && response.status < 500 {
                self.cache_store(original_url.as_str(), &response).await;
            }

            if let Some(permit) = permit {
                permit.release().await;
            }
            return Ok(response);
        }
    }

    fn redirect_decision(
        &self,
        current: &Request,
        status: u16,
        destination: &Url,
    ) -> RedirectDecision {
        match &self.on_redirect {
            Some(hook) => {
                let probe = Request::get(destination.clone(), current.depth);
                hook(&probe, status)
            }
            None => RedirectDecision::Follow,
        }
    }

    async fn round_trip(&self, request: &Request) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder.send().await
    }

    /// Stream the body, truncating at `max_body_size` (0 = unlimited).
    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>, CrawlError> {
        use futures_util::StreamExt;

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(CrawlError::from)?;
            if self.max_body_size > 0 {
                let remaining = (self.max_body_size as usize).saturating_sub(body.len());
                if remaining == 0 {
                    break;
                }
                if chunk.len() > remaining {
                    body.extend_from_slice(&chunk[..remaining]);
                    break;
                }
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn cache_eligible(&self, request: &Request) -> bool {
        self.cache.is_some()
            && request.method == Method::GET
            && !request
                .headers
                .get(CACHE_CONTROL)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.to_ascii_lowercase().contains("no-cache"))
    }

    /// Serve from cache if a fresh entry exists. Entries with a 5xx status
    /// are treated as misses so the next fetch can replace them. The
    /// post-headers hook still runs on hits.
    async fn cache_lookup(&self, request: Request) -> Result<Option<Response>, CrawlError> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        let Some(cached) = cache.load(request.url.as_str()).await else {
            return Ok(None);
        };
        if cached.status >= 500 {
            return Ok(None);
        }

        if let Some(hook) = &self.post_headers
            && !hook(&request, cached.status, &cached.headers)
        {
            return Err(CrawlError::AbortedAfterHeaders {
                status: cached.status,
            });
        }

        debug!("cache hit for {}", request.url);
        Ok(Some(Response {
            status: cached.status,
            body: cached.body,
            headers: cached.headers,
            request,
            redirect_chain: Vec::new(),
        }))
    }

    async fn cache_store(&self, url: &str, response: &Response) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache
                .store(url, response.status, &response.headers, &response.body)
                .await
        {
            warn!("failed to cache {url}: {e}");
        }
    }
}

/// Decode gzip bodies flagged by `Content-Encoding`, a gzip content type,
/// or a `.xml.gz` suffix (compressed sitemaps). Decode failures fall back
/// to the raw bytes.
fn maybe_gunzip(url: &Url, headers: &HeaderMap, raw: Vec<u8>) -> Vec<u8> {
    let encoded = headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("gzip"));
    let type_hint = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| {
            let v = v.to_ascii_lowercase();
            v.contains("application/gzip") || v.contains("application/x-gzip")
        });
    let suffix_hint = url.path().ends_with(".xml.gz");

    if !(encoded || type_hint || suffix_hint) || raw.is_empty() {
        return raw;
    }

    let mut decoder = MultiGzDecoder::new(raw.as_slice());
    let mut out = Vec::new();
    match decoder.read_to_end(&mut out) {
        Ok(_) => out,
        Err(e) => {
            warn!("gzip decode failed for {url}, keeping raw body: {e}");
            raw
        }
    }
}
