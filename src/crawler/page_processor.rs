//! Single page processing: fetch with retries, visited marking, parsing,
//! link discovery and result emission.
//!
//! Redirect hops are reported strictly in hop order, followed by the
//! terminal page; the embedder may rely on that ordering. Every URL in the
//! chain plus the final URL is marked visited before any discovered link
//! is processed.

use std::sync::Arc;

use log::{debug, info, warn};
use scraper::ElementRef;
use url::Url;

use super::page::{ChainHop, PageLink, PageResult};
use super::{CrawlerInner, WorkItem};
use crate::content_hash::{normalized_hash, raw_hash};
use crate::error::{CrawlError, retry_backoff};
use crate::fetcher::{Request, Response};
use crate::parser::{
    HeadingLevel, LinkSink, ParsedPage, collapse_whitespace, decode_body, run_html_handlers,
    run_xml_handlers,
};
use crate::utils::url_utils::normalize_url;
use crate::visited::fingerprint;

/// Upper bound on link context length, in characters.
const CONTEXT_LIMIT: usize = 240;

pub(crate) async fn process_page(inner: Arc<CrawlerInner>, item: WorkItem) {
    // Items already in the queue when the page limit is hit are dropped
    // here, counted like any other admission rejection.
    if let Some(limit) = inner.config.limit()
        && inner.stats.pages_emitted() >= limit
    {
        inner
            .stats
            .record_rejection(crate::admission::AdmissionReason::PageLimitReached);
        return;
    }

    info!("crawling [depth {}]: {}", item.depth, item.url);

    let max_retries = inner.config.max_retries();
    let mut attempt: u8 = 0;

    let outcome = loop {
        let mut request = Request::get(item.url.clone(), item.depth);
        if attempt > 0 {
            request.check_revisit = false;
        }

        let fetched = tokio::select! {
            () = inner.cancel.cancelled() => {
                debug!("cancelled while fetching {}", item.url);
                return;
            }
            result = inner.fetcher.fetch(request) => result,
        };

        match fetched {
            Ok(response) if response.status >= 500 && attempt < max_retries => {
                attempt += 1;
                debug!(
                    "server error {} for {} (attempt {attempt}/{max_retries})",
                    response.status, item.url
                );
                tokio::time::sleep(retry_backoff(attempt)).await;
            }
            Ok(response) => break Ok(response),
            Err(error) if error.is_retryable() && attempt < max_retries => {
                attempt += 1;
                warn!(
                    "transport failure for {} (attempt {attempt}/{max_retries}): {error}",
                    item.url
                );
                tokio::time::sleep(retry_backoff(attempt)).await;
            }
            Err(error) => break Err(error),
        }
    };

    match outcome {
        Ok(response) => handle_response(&inner, &item, response).await,
        Err(error) => handle_failure(&inner, &item, &error),
    }
}

/// Convert a terminal fetch error into its `PageResult` outcome.
fn handle_failure(inner: &CrawlerInner, item: &WorkItem, error: &CrawlError) {
    if matches!(error, CrawlError::Cancelled) {
        return;
    }

    inner.report_error(item.url.as_str(), error);

    let result = match error {
        CrawlError::AbortedAfterHeaders { status } => PageResult {
            url: item.url.to_string(),
            status: *status,
            depth: item.depth,
            aborted: true,
            ..PageResult::default()
        },
        CrawlError::AbortedBeforeRequest => PageResult {
            url: item.url.to_string(),
            depth: item.depth,
            aborted: true,
            ..PageResult::default()
        },
        other => PageResult::failed(item.url.as_str(), 0, item.depth, other.to_string()),
    };

    inner.emit(result);
}

async fn handle_response(inner: &Arc<CrawlerInner>, item: &WorkItem, response: Response) {
    let strip = inner.config.strip_tracking_params();

    // Mark and report every redirect hop, in hop order. A hop already
    // visited through another chain is marked but not re-reported, which
    // keeps emission exactly-once per fingerprint.
    for hop in &response.redirect_chain {
        let fp = canonical_fingerprint(&hop.source, strip);
        let fresh = !inner.visited.visit_if_not_visited(fp);
        if fresh || fp == item.fingerprint {
            inner.emit(PageResult::hop(hop.source.as_str(), hop.status, item.depth));
        }
    }

    let final_url = response.request.url.clone();
    let final_fp = canonical_fingerprint(&final_url, strip);
    let fresh = !inner.visited.visit_if_not_visited(final_fp);
    let emit_final = fresh || final_fp == item.fingerprint;

    for callback in inner.callbacks.response_callbacks() {
        callback(&response);
    }

    let mut result = PageResult {
        url: final_url.to_string(),
        status: response.status,
        depth: item.depth,
        redirect_chain: response
            .redirect_chain
            .iter()
            .map(|hop| ChainHop {
                url: hop.source.to_string(),
                status: hop.status,
                location: hop.location.clone(),
            })
            .collect(),
        ..PageResult::default()
    };

    let mut discovered: Vec<Url> = Vec::new();

    let (body_text, subresources) = body_text_for(inner, &final_url, &response).await;
    for sub in subresources {
        if let Ok(url) = final_url.join(&sub) {
            discovered.push(url);
        }
    }

    if response.is_success() && response.is_html() {
        // The parsed document is not Send; parsing, extraction and all CSS
        // callbacks stay inside this block, before the next await.
        let page = ParsedPage::parse(&body_text, &final_url);
        let sink = LinkSink::new();

        result.title = page.title().unwrap_or_default();
        result.h1 = page.headings(HeadingLevel::H1);
        result.h2 = page.headings(HeadingLevel::H2);
        result.meta_description = page.meta_description();
        result.canonical = page.canonical();

        for anchor in page.anchors() {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(url) = page.absolute_url(href) else {
                continue;
            };

            let link = PageLink {
                url: url.to_string(),
                anchor: collapse_whitespace(&anchor.text().collect::<String>()),
                context: link_context(anchor),
                rel: anchor.value().attr("rel").map(str::to_string),
            };

            if inner.is_internal(&url) {
                discovered.push(url);
                result.internal_links.push(link);
            } else {
                result.external_links.push(link);
            }
        }

        let handlers = inner.callbacks.html_handlers();
        if !handlers.is_empty() {
            run_html_handlers(&page, &response.request, &handlers, &sink);
            discovered.extend(sink.drain());
        }
    }

    if response.is_success() && response.is_xml() {
        let handlers = inner.callbacks.xml_handlers();
        if !handlers.is_empty() {
            let sink = LinkSink::new();
            run_xml_handlers(&body_text, &final_url, &handlers, &sink);
            discovered.extend(sink.drain());
        }
    }

    result.raw_hash = raw_hash(&response.body);
    result.normalized_hash = normalized_hash(&body_text);

    // Emit before admitting discovered links so the page limit counts
    // this result; within a page the order stays hops-then-final.
    if emit_final {
        inner.emit(result);
    }

    let next_depth = item.depth + 1;
    for url in discovered {
        inner.try_enqueue(url.as_str(), next_depth).await;
    }
}

/// Body text for parsing: the rendered DOM when a renderer is installed
/// and `js_rendering` is on, the decoded fetched body otherwise.
async fn body_text_for(
    inner: &CrawlerInner,
    url: &Url,
    response: &Response,
) -> (String, Vec<String>) {
    if inner.config.js_rendering() && response.is_success() && response.is_html() {
        let renderer = inner.renderer.read().clone();
        if let Some(renderer) = renderer {
            match renderer.render(url, inner.config.rendering_config()).await {
                Ok(rendered) => return (rendered.html, rendered.subresources),
                Err(e) => warn!("renderer failed for {url}, using fetched body: {e}"),
            }
        }
    }
    (
        decode_body(&response.body, response.content_type()),
        Vec::new(),
    )
}

/// Fingerprint over the admission-normalized form of a URL so chain URLs
/// dedup against admitted ones.
fn canonical_fingerprint(url: &Url, strip_tracking: bool) -> u64 {
    match normalize_url(url.as_str(), strip_tracking) {
        Ok(canonical) => fingerprint(&canonical, None),
        Err(_) => fingerprint(url, None),
    }
}

/// Text of the nearest enclosing block element, truncated. Gives the
/// embedder the sentence or list item the link appeared in.
fn link_context(anchor: ElementRef<'_>) -> String {
    for node in anchor.ancestors() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if matches!(
            element.value().name(),
            "p" | "li" | "td" | "th" | "dd" | "blockquote" | "figcaption" | "caption"
        ) {
            let text = collapse_whitespace(&element.text().collect::<String>());
            return text.chars().take(CONTEXT_LIMIT).collect();
        }
    }
    String::new()
}
