//! Sitemap seeding.
//!
//! When enabled, `start` also fetches `{origin}/sitemap.xml` and admits
//! every listed URL as an additional crawl root (depth 0). Sitemap index
//! files are followed one level deep; compressed sitemaps arrive already
//! decoded by the fetcher.

use std::sync::Arc;

use log::{debug, info};
use url::Url;

use super::CrawlerInner;
use crate::fetcher::Request;
use crate::parser::{collect_path_text, decode_body};

pub(crate) async fn seed_from_sitemap(inner: &Arc<CrawlerInner>, seed: &Url) {
    let Ok(sitemap_url) = seed.join("/sitemap.xml") else {
        return;
    };

    let locs = fetch_sitemap_locs(inner, &sitemap_url).await;
    let mut admitted = 0usize;
    for loc in &locs {
        if inner.try_enqueue(loc, 0).await {
            admitted += 1;
        }
    }
    if !locs.is_empty() {
        info!(
            "sitemap seeding: {admitted} of {} listed URLs admitted",
            locs.len()
        );
    }
}

/// Fetch one sitemap and return every page `<loc>`, expanding a sitemap
/// index one level.
async fn fetch_sitemap_locs(inner: &Arc<CrawlerInner>, url: &Url) -> Vec<String> {
    let mut request = Request::get(url.clone(), 0);
    request.check_revisit = false;

    let response = match inner.fetcher.fetch(request).await {
        Ok(response) if response.is_success() => response,
        Ok(response) => {
            debug!("no sitemap at {url} (status {})", response.status);
            return Vec::new();
        }
        Err(e) => {
            debug!("sitemap fetch failed for {url}: {e}");
            return Vec::new();
        }
    };

    let text = decode_body(&response.body, response.content_type());
    let mut locs = collect_path_text(&text, "/urlset/url/loc");

    for nested in collect_path_text(&text, "/sitemapindex/sitemap/loc") {
        let Ok(nested_url) = Url::parse(&nested) else {
            continue;
        };
        let mut request = Request::get(nested_url.clone(), 0);
        request.check_revisit = false;
        if let Ok(nested_response) = inner.fetcher.fetch(request).await
            && nested_response.is_success()
        {
            let nested_text =
                decode_body(&nested_response.body, nested_response.content_type());
            locs.extend(collect_path_text(&nested_text, "/urlset/url/loc"));
        }
    }

    locs
}
