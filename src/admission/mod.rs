//! Admission filter: decides whether a candidate URL is crawlable.
//!
//! The check sequence is fixed: parse and normalize, depth limit,
//! disallowed extension, domain allow/deny lists, excluded patterns,
//! robots policy, and finally the visited test-and-set. The test-and-set
//! comes last so a URL rejected for any other reason never poisons the
//! visited store, and an admitted URL is marked visited atomically with
//! its admission.

use std::collections::HashSet;

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::config::CrawlConfig;
use crate::fetcher::Fetcher;
use crate::robots::{RobotsCache, RobotsMode};
use crate::utils::url_utils::{host_matches_domain, is_fetchable_url, normalize_url};
use crate::visited::{VisitedStore, fingerprint};

/// File extensions that are never worth fetching for link discovery.
static DISALLOWED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "tif", "tiff", "css", "js",
        "mjs", "woff", "woff2", "ttf", "eot", "otf", "mp3", "mp4", "avi", "mov", "wmv", "flv",
        "webm", "wav", "ogg", "pdf", "zip", "gz", "tar", "rar", "7z", "exe", "dmg", "iso", "bin",
        "apk", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    ])
});

/// Enumerated cause for rejecting a candidate URL. Rejections are silent;
/// the crawler counts them per reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionReason {
    InvalidUrl,
    SchemeUnsupported,
    DepthExceeded,
    SkippedExtension,
    DomainFiltered,
    ExcludedPattern,
    RobotsBlocked,
    AlreadyVisited,
    PageLimitReached,
}

/// Outcome of an admission check.
#[derive(Debug)]
pub enum AdmissionVerdict {
    /// The URL was normalized, passed every check, and its fingerprint has
    /// been committed to the visited store.
    Admitted { url: Url, fingerprint: u64 },
    Rejected(AdmissionReason),
}

/// Immutable admission policy derived from the crawl configuration.
pub struct AdmissionFilter {
    allowed_domains: Vec<String>,
    disallowed_domains: Vec<String>,
    excluded_patterns: Vec<Regex>,
    max_depth: u16,
    strip_tracking: bool,
    robots_mode: RobotsMode,
}

impl AdmissionFilter {
    #[must_use]
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            allowed_domains: config.allowed_domains().map(<[String]>::to_vec).unwrap_or_default(),
            disallowed_domains: config
                .disallowed_domains()
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
            excluded_patterns: config.excluded_patterns_compiled().to_vec(),
            max_depth: config.max_depth(),
            strip_tracking: config.strip_tracking_params(),
            robots_mode: config.robots_mode(),
        }
    }

    /// Check everything up to but excluding robots and the visited store.
    ///
    /// Split out so the synchronous part can be unit-tested without a
    /// fetcher; `admit` layers the async robots check and the test-and-set
    /// on top.
    pub fn precheck(&self, raw: &str, depth: u16) -> Result<Url, AdmissionReason> {
        if !is_fetchable_url(raw) {
            return Err(AdmissionReason::InvalidUrl);
        }

        let url = normalize_url(raw, self.strip_tracking).map_err(|_| AdmissionReason::InvalidUrl)?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AdmissionReason::SchemeUnsupported);
        }
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return Err(AdmissionReason::InvalidUrl);
        };

        if depth > self.max_depth {
            return Err(AdmissionReason::DepthExceeded);
        }

        if has_disallowed_extension(&url) {
            return Err(AdmissionReason::SkippedExtension);
        }

        if !self.allowed_domains.is_empty()
            && !self
                .allowed_domains
                .iter()
                .any(|d| host_matches_domain(&host, d))
        {
            return Err(AdmissionReason::DomainFiltered);
        }
        if self
            .disallowed_domains
            .iter()
            .any(|d| host_matches_domain(&host, d))
        {
            return Err(AdmissionReason::DomainFiltered);
        }

        if self
            .excluded_patterns
            .iter()
            .any(|p| p.is_match(url.as_str()))
        {
            return Err(AdmissionReason::ExcludedPattern);
        }

        Ok(url)
    }

    /// Full admission check. On success the fingerprint has already been
    /// committed to the visited store, so the caller must enqueue.
    pub async fn admit(
        &self,
        raw: &str,
        depth: u16,
        check_revisit: bool,
        visited: &VisitedStore,
        robots: &RobotsCache,
        fetcher: &Fetcher,
    ) -> AdmissionVerdict {
        let url = match self.precheck(raw, depth) {
            Ok(url) => url,
            Err(reason) => return AdmissionVerdict::Rejected(reason),
        };

        match self.robots_mode {
            RobotsMode::Ignore => {}
            RobotsMode::Respect => {
                if !robots.allowed(fetcher, &url).await {
                    return AdmissionVerdict::Rejected(AdmissionReason::RobotsBlocked);
                }
            }
            RobotsMode::IgnoreReport => {
                if !robots.allowed(fetcher, &url).await {
                    info!("robots.txt would block {url} (mode: ignore-report)");
                }
            }
        }

        let fp = fingerprint(&url, None);
        if check_revisit && visited.visit_if_not_visited(fp) {
            return AdmissionVerdict::Rejected(AdmissionReason::AlreadyVisited);
        }
        if !check_revisit {
            visited.visit(fp);
        }

        AdmissionVerdict::Admitted {
            url,
            fingerprint: fp,
        }
    }
}

fn has_disallowed_extension(url: &Url) -> bool {
    let path = url.path();
    let Some(last_segment) = path.rsplit('/').next() else {
        return false;
    };
    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            DISALLOWED_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(max_depth: u16) -> AdmissionFilter {
        AdmissionFilter {
            allowed_domains: Vec::new(),
            disallowed_domains: Vec::new(),
            excluded_patterns: Vec::new(),
            max_depth,
            strip_tracking: true,
            robots_mode: RobotsMode::Ignore,
        }
    }

    #[test]
    fn rejects_unsupported_schemes() {
        let f = filter(3);
        assert!(matches!(
            f.precheck("ftp://example.com/file", 0),
            Err(AdmissionReason::SchemeUnsupported)
        ));
        assert!(matches!(
            f.precheck("javascript:void(0)", 0),
            Err(AdmissionReason::InvalidUrl)
        ));
    }

    #[test]
    fn rejects_beyond_max_depth() {
        let f = filter(2);
        assert!(f.precheck("https://example.com/a", 2).is_ok());
        assert!(matches!(
            f.precheck("https://example.com/a", 3),
            Err(AdmissionReason::DepthExceeded)
        ));
    }

    #[test]
    fn rejects_asset_extensions() {
        let f = filter(3);
        assert!(matches!(
            f.precheck("https://example.com/logo.PNG", 0),
            Err(AdmissionReason::SkippedExtension)
        ));
        assert!(matches!(
            f.precheck("https://example.com/style.css?v=3", 0),
            Err(AdmissionReason::SkippedExtension)
        ));
        assert!(f.precheck("https://example.com/page.html", 0).is_ok());
        assert!(f.precheck("https://example.com/about", 0).is_ok());
    }

    #[test]
    fn domain_lists_gate_hosts() {
        let mut f = filter(3);
        f.allowed_domains = vec!["example.com".into()];
        assert!(f.precheck("https://docs.example.com/a", 0).is_ok());
        assert!(matches!(
            f.precheck("https://other.org/a", 0),
            Err(AdmissionReason::DomainFiltered)
        ));

        f.disallowed_domains = vec!["docs.example.com".into()];
        assert!(matches!(
            f.precheck("https://docs.example.com/a", 0),
            Err(AdmissionReason::DomainFiltered)
        ));
    }

    #[test]
    fn excluded_patterns_apply() {
        let mut f = filter(3);
        f.excluded_patterns = vec![Regex::new("^.*/private/.*$").unwrap()];
        assert!(matches!(
            f.precheck("https://example.com/private/x", 0),
            Err(AdmissionReason::ExcludedPattern)
        ));
        assert!(f.precheck("https://example.com/public/x", 0).is_ok());
    }
}
