//! Getter methods resolving `Option` fields to their effective values.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use super::types::CrawlConfig;
use crate::limiter::LimitRule;
use crate::render::RenderingConfig;
use crate::robots::RobotsMode;
use crate::utils::constants::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_PARALLELISM, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_USER_AGENT,
};

impl CrawlConfig {
    #[must_use]
    pub fn allowed_domains(&self) -> Option<&[String]> {
        self.allowed_domains.as_deref()
    }

    #[must_use]
    pub fn disallowed_domains(&self) -> Option<&[String]> {
        self.disallowed_domains.as_deref()
    }

    /// Pre-compiled excluded patterns, built once at config creation.
    #[must_use]
    pub fn excluded_patterns_compiled(&self) -> &[Regex] {
        &self.excluded_patterns_compiled
    }

    #[must_use]
    pub fn max_depth(&self) -> u16 {
        self.max_depth
    }

    /// Worker pool size, floored at 1.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism.unwrap_or(DEFAULT_PARALLELISM).max(1)
    }

    #[must_use]
    pub fn robots_mode(&self) -> RobotsMode {
        self.robots_mode
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Effective body cap in bytes; 0 means unlimited.
    #[must_use]
    pub fn max_body_size(&self) -> u64 {
        self.max_body_size.unwrap_or(DEFAULT_MAX_BODY_SIZE)
    }

    #[must_use]
    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    #[must_use]
    pub fn max_retries(&self) -> u8 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    #[must_use]
    pub fn cache_dir(&self) -> Option<&PathBuf> {
        self.cache_dir.as_ref()
    }

    /// Cache TTL; zero never expires.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.unwrap_or(0))
    }

    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    #[must_use]
    pub fn strip_tracking_params(&self) -> bool {
        self.strip_tracking_params
    }

    #[must_use]
    pub fn use_sitemap(&self) -> bool {
        self.use_sitemap
    }

    #[must_use]
    pub fn js_rendering(&self) -> bool {
        self.js_rendering
    }

    #[must_use]
    pub fn rendering_config(&self) -> &RenderingConfig {
        &self.rendering
    }

    #[must_use]
    pub fn limit_rules(&self) -> &[LimitRule] {
        &self.limit_rules
    }
}
