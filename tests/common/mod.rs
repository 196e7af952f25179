//! Shared helpers for integration tests.

use std::sync::{Arc, Mutex};

use bluesnake::{CrawlConfig, Crawler, PageResult, RobotsMode};

/// Initialize env_logger once; repeated calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config suited to hitting a local mock server: robots checks off,
/// tracking-param stripping on, no cache.
#[allow(dead_code)]
pub fn local_config() -> CrawlConfig {
    CrawlConfig::builder()
        .robots_mode(RobotsMode::Ignore)
        .max_depth(3)
        .parallelism(4)
        .max_retries(0)
        .build()
        .expect("test config")
}

/// Attach a collector to the crawler and return the shared result list.
#[allow(dead_code)]
pub fn collect_results(crawler: &Crawler) -> Arc<Mutex<Vec<PageResult>>> {
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    crawler.set_on_page_crawled(move |page| {
        sink.lock().expect("results lock").push(page.clone());
    });
    results
}

/// Minimal HTML page with a title and links.
#[allow(dead_code)]
pub fn html_page(title: &str, links: &[&str]) -> String {
    let anchors = links
        .iter()
        .map(|href| format!("<p>See <a href=\"{href}\">{href}</a> here.</p>"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("<html><head><title>{title}</title></head><body><h1>{title}</h1>{anchors}</body></html>")
}
