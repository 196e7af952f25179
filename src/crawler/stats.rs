//! Crawl counters.
//!
//! Admission rejections are silent by design; these counters are how the
//! embedder observes them. All counters are plain atomics, safe to read
//! while the crawl runs.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

use crate::admission::AdmissionReason;

#[derive(Debug, Default)]
pub struct CrawlStats {
    pages_emitted: AtomicUsize,
    invalid_url: AtomicU64,
    scheme_unsupported: AtomicU64,
    depth_exceeded: AtomicU64,
    skipped_extension: AtomicU64,
    domain_filtered: AtomicU64,
    excluded_pattern: AtomicU64,
    robots_blocked: AtomicU64,
    already_visited: AtomicU64,
    page_limit_reached: AtomicU64,
}

impl CrawlStats {
    pub fn record_rejection(&self, reason: AdmissionReason) {
        let counter = match reason {
            AdmissionReason::InvalidUrl => &self.invalid_url,
            AdmissionReason::SchemeUnsupported => &self.scheme_unsupported,
            AdmissionReason::DepthExceeded => &self.depth_exceeded,
            AdmissionReason::SkippedExtension => &self.skipped_extension,
            AdmissionReason::DomainFiltered => &self.domain_filtered,
            AdmissionReason::ExcludedPattern => &self.excluded_pattern,
            AdmissionReason::RobotsBlocked => &self.robots_blocked,
            AdmissionReason::AlreadyVisited => &self.already_visited,
            AdmissionReason::PageLimitReached => &self.page_limit_reached,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.pages_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of `PageResult`s emitted so far (hops included).
    #[must_use]
    pub fn pages_emitted(&self) -> usize {
        self.pages_emitted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> CrawlStatsSnapshot {
        CrawlStatsSnapshot {
            pages_emitted: self.pages_emitted.load(Ordering::Relaxed),
            invalid_url: self.invalid_url.load(Ordering::Relaxed),
            scheme_unsupported: self.scheme_unsupported.load(Ordering::Relaxed),
            depth_exceeded: self.depth_exceeded.load(Ordering::Relaxed),
            skipped_extension: self.skipped_extension.load(Ordering::Relaxed),
            domain_filtered: self.domain_filtered.load(Ordering::Relaxed),
            excluded_pattern: self.excluded_pattern.load(Ordering::Relaxed),
            robots_blocked: self.robots_blocked.load(Ordering::Relaxed),
            already_visited: self.already_visited.load(Ordering::Relaxed),
            page_limit_reached: self.page_limit_reached.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the crawl counters.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlStatsSnapshot {
    pub pages_emitted: usize,
    pub invalid_url: u64,
    pub scheme_unsupported: u64,
    pub depth_exceeded: u64,
    pub skipped_extension: u64,
    pub domain_filtered: u64,
    pub excluded_pattern: u64,
    pub robots_blocked: u64,
    pub already_visited: u64,
    pub page_limit_reached: u64,
}
