//! Fluent builder for `CrawlConfig`.
//!
//! Validation happens once at `build()`: glob patterns are compiled and
//! bad values surface as `CrawlError::Config` before a crawler is ever
//! constructed.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use super::types::CrawlConfig;
use crate::error::CrawlError;
use crate::limiter::LimitRule;
use crate::render::RenderingConfig;
use crate::robots::RobotsMode;

/// Compile a glob pattern into an anchored regex (`*` matches any
/// sequence, everything else is literal).
fn compile_glob_pattern(pattern: &str) -> Result<Regex, CrawlError> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    let anchored = format!("^{escaped}$");
    Regex::new(&anchored)
        .map_err(|e| CrawlError::Config(format!("invalid glob pattern '{pattern}': {e}")))
}

#[derive(Debug, Default)]
pub struct CrawlConfigBuilder {
    config: CrawlConfig,
}

impl CrawlConfig {
    /// Create a builder with every field at its default.
    #[must_use]
    pub fn builder() -> CrawlConfigBuilder {
        CrawlConfigBuilder::default()
    }
}

impl CrawlConfigBuilder {
    #[must_use]
    pub fn allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.config.allowed_domains = Some(domains);
        self
    }

    #[must_use]
    pub fn disallowed_domains(mut self, domains: Vec<String>) -> Self {
        self.config.disallowed_domains = Some(domains);
        self
    }

    /// URL glob patterns excluded from the crawl (`*` matches any
    /// sequence).
    #[must_use]
    pub fn excluded_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.excluded_patterns = Some(patterns);
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: u16) -> Self {
        self.config.max_depth = depth;
        self
    }

    #[must_use]
    pub fn parallelism(mut self, workers: usize) -> Self {
        self.config.parallelism = Some(workers);
        self
    }

    #[must_use]
    pub fn robots_mode(mut self, mode: RobotsMode) -> Self {
        self.config.robots_mode = mode;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(agent.into());
        self
    }

    /// Response body cap in bytes; 0 means unlimited.
    #[must_use]
    pub fn max_body_size(mut self, bytes: u64) -> Self {
        self.config.max_body_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u8) -> Self {
        self.config.max_retries = Some(retries);
        self
    }

    /// Enable the on-disk response cache rooted at `dir`.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    /// Cache entry lifetime; zero never expires.
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl_secs = Some(ttl.as_secs());
        self
    }

    /// Stop admitting new pages after this many results.
    #[must_use]
    pub fn limit(mut self, pages: usize) -> Self {
        self.config.limit = Some(pages);
        self
    }

    #[must_use]
    pub fn strip_tracking_params(mut self, strip: bool) -> Self {
        self.config.strip_tracking_params = strip;
        self
    }

    /// Also seed the crawl from `/sitemap.xml`.
    #[must_use]
    pub fn use_sitemap(mut self, enabled: bool) -> Self {
        self.config.use_sitemap = enabled;
        self
    }

    #[must_use]
    pub fn js_rendering(mut self, enabled: bool) -> Self {
        self.config.js_rendering = enabled;
        self
    }

    #[must_use]
    pub fn rendering_config(mut self, rendering: RenderingConfig) -> Self {
        self.config.rendering = rendering;
        self
    }

    /// Append a per-domain rate limit rule (matched in insertion order).
    #[must_use]
    pub fn limit_rule(mut self, rule: LimitRule) -> Self {
        self.config.limit_rules.push(rule);
        self
    }

    /// Validate and produce the configuration.
    pub fn build(mut self) -> Result<CrawlConfig, CrawlError> {
        if self.config.parallelism.is_some_and(|p| p == 0) {
            return Err(CrawlError::Config("parallelism must be at least 1".into()));
        }

        self.config.excluded_patterns_compiled = match &self.config.excluded_patterns {
            Some(patterns) => patterns
                .iter()
                .map(|p| compile_glob_pattern(p))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        for rule in &self.config.limit_rules {
            if rule.domain_regex.is_none() && rule.domain_glob.is_none() {
                return Err(CrawlError::Config(
                    "limit rule needs a domain_regex or domain_glob".into(),
                ));
            }
        }

        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_partial_overrides() {
        let config = CrawlConfig::builder()
            .user_agent("custom/1.0")
            .build()
            .unwrap();

        // Setting one field must not zero the others' defaults.
        assert_eq!(config.user_agent(), "custom/1.0");
        assert_eq!(config.max_body_size(), 10 * 1024 * 1024);
        assert_eq!(config.parallelism(), 8);
    }

    #[test]
    fn explicit_zero_body_size_means_unlimited() {
        let config = CrawlConfig::builder().max_body_size(0).build().unwrap();
        assert_eq!(config.max_body_size(), 0);
    }

    #[test]
    fn zero_parallelism_is_invalid() {
        assert!(CrawlConfig::builder().parallelism(0).build().is_err());
    }

    #[test]
    fn excluded_globs_compile_and_match() {
        let config = CrawlConfig::builder()
            .excluded_patterns(vec!["*/private/*".into()])
            .build()
            .unwrap();

        let compiled = config.excluded_patterns_compiled();
        assert_eq!(compiled.len(), 1);
        assert!(compiled[0].is_match("https://example.com/private/x"));
        assert!(!compiled[0].is_match("https://example.com/public/x"));
    }

    #[test]
    fn bad_limit_rule_is_rejected() {
        let result = CrawlConfig::builder()
            .limit_rule(LimitRule::default())
            .build();
        assert!(result.is_err());
    }
}
