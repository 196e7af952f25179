//! Core configuration types for the crawl engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::limiter::LimitRule;
use crate::render::RenderingConfig;
use crate::robots::RobotsMode;

/// Main configuration struct for a crawl.
///
/// All crawl policy lives here and in the admission filter built from it;
/// the fetcher only reads the HTTP-mechanical fields (user agent, timeout,
/// body limit, cache location).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Hosts the crawl may visit. Empty/None means "the seed's host"
    /// (internal-link classification still uses the seed host).
    pub(crate) allowed_domains: Option<Vec<String>>,
    /// Hosts the crawl must never visit, checked after the allow list.
    pub(crate) disallowed_domains: Option<Vec<String>>,
    /// Glob patterns (\* matches any sequence) excluding URLs outright.
    pub(crate) excluded_patterns: Option<Vec<String>>,

    /// Compiled form of `excluded_patterns`, built once at config creation
    /// to avoid hot-path regex compilation.
    #[serde(skip)]
    pub(crate) excluded_patterns_compiled: Vec<regex::Regex>,

    pub(crate) max_depth: u16,

    /// Worker pool size. `None` = default (8).
    pub(crate) parallelism: Option<usize>,

    pub(crate) robots_mode: RobotsMode,

    /// `None` = the default bluesnake agent string.
    pub(crate) user_agent: Option<String>,

    /// Response body cap in bytes. `None` = default (10 MiB);
    /// `Some(0)` = unlimited. The sentinel is explicit in the type.
    pub(crate) max_body_size: Option<u64>,

    /// Per-request timeout applied by the transport. `None` = default.
    pub(crate) request_timeout_secs: Option<u64>,

    /// Retry budget for transport failures and 5xx. `None` = default (3).
    pub(crate) max_retries: Option<u8>,

    /// Root of the on-disk response cache. `None` disables caching.
    pub(crate) cache_dir: Option<PathBuf>,

    /// Cache entry lifetime from file mtime. `None`/0 = never expires.
    pub(crate) cache_ttl_secs: Option<u64>,

    /// Stop admitting new pages once this many results were emitted.
    pub(crate) limit: Option<usize>,

    /// Drop `utm_*`-style query parameters during URL normalization.
    pub(crate) strip_tracking_params: bool,

    /// Also seed the crawl from `/sitemap.xml`.
    pub(crate) use_sitemap: bool,

    /// Substitute rendered DOM for the fetched body when a renderer is
    /// installed on the crawler.
    pub(crate) js_rendering: bool,

    pub(crate) rendering: RenderingConfig,

    /// Per-domain rate limit rules, matched in order, first match wins.
    pub(crate) limit_rules: Vec<LimitRule>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            allowed_domains: None,
            disallowed_domains: None,
            excluded_patterns: None,
            excluded_patterns_compiled: Vec::new(),
            max_depth: crate::utils::constants::DEFAULT_MAX_DEPTH,
            parallelism: None,
            robots_mode: RobotsMode::default(),
            user_agent: None,
            max_body_size: None,
            request_timeout_secs: None,
            max_retries: None,
            cache_dir: None,
            cache_ttl_secs: None,
            limit: None,
            strip_tracking_params: true,
            use_sitemap: false,
            js_rendering: false,
            rendering: RenderingConfig::default(),
            limit_rules: Vec::new(),
        }
    }
}
