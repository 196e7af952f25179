//! Parse-once pipeline over fetched documents.
//!
//! Each successful HTML response is decoded and parsed exactly once; the
//! crawler's own extraction and every registered CSS callback run over the
//! same `scraper::Html`. A `<base href>` inside the document overrides the
//! request URL for all absolute-URL computations on that response. The XML
//! branch (see [`xml`]) runs over the same bytes when the content type is
//! XML.
//!
//! The parsed document is not `Send`, so parsing and callback execution are
//! synchronous and fully contained within a worker's processing step;
//! discovered URLs leave through the [`LinkSink`].

pub mod charset;
pub mod xml;

use std::sync::Arc;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::fetcher::Request;
use crate::utils::url_utils::is_fetchable_url;

pub use charset::decode_body;
pub use xml::{XmlCallback, XmlElement, XmlHandler, collect_path_text, run_xml_handlers};

static BASE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("base[href]").expect("base selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("head > title, title").expect("title selector"));
static H1_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("h1 selector"));
static H2_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").expect("h2 selector"));
static META_DESCRIPTION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).expect("meta selector"));
static CANONICAL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel="canonical"]"#).expect("canonical selector"));
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("anchor selector"));

/// Callback invoked for each element matching a registered CSS selector.
pub type HtmlCallback = Arc<dyn Fn(&HtmlElement<'_>) + Send + Sync>;

/// A registered `(selector, callback)` pair. Callbacks run in insertion
/// order.
pub struct HtmlHandler {
    pub selector: Selector,
    pub callback: HtmlCallback,
}

/// Collects URLs queued for discovery by callbacks while the non-`Send`
/// document is alive; the crawler drains it afterwards and runs admission.
#[derive(Debug, Default)]
pub struct LinkSink {
    collected: Mutex<Vec<Url>>,
}

impl LinkSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: Url) {
        self.collected.lock().expect("link sink poisoned").push(url);
    }

    #[must_use]
    pub fn drain(&self) -> Vec<Url> {
        std::mem::take(&mut *self.collected.lock().expect("link sink poisoned"))
    }
}

/// A fetched document parsed exactly once, with its effective base URL.
pub struct ParsedPage {
    pub document: Html,
    /// `<base href>` override when present, the request URL otherwise.
    pub base_url: Url,
}

impl ParsedPage {
    /// Parse an HTML document and resolve its base URL.
    #[must_use]
    pub fn parse(text: &str, request_url: &Url) -> Self {
        let document = Html::parse_document(text);

        let base_url = document
            .select(&BASE_SELECTOR)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| request_url.join(href).ok())
            .unwrap_or_else(|| request_url.clone());

        Self { document, base_url }
    }

    /// Resolve an href against the page's base URL, filtering pseudo-URLs.
    #[must_use]
    pub fn absolute_url(&self, href: &str) -> Option<Url> {
        if !is_fetchable_url(href) {
            return None;
        }
        self.base_url.join(href.trim()).ok()
    }

    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    }

    #[must_use]
    pub fn headings(&self, level: HeadingLevel) -> Vec<String> {
        let selector = match level {
            HeadingLevel::H1 => &*H1_SELECTOR,
            HeadingLevel::H2 => &*H2_SELECTOR,
        };
        self.document
            .select(selector)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect()
    }

    #[must_use]
    pub fn meta_description(&self) -> Option<String> {
        self.document
            .select(&META_DESCRIPTION_SELECTOR)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    #[must_use]
    pub fn canonical(&self) -> Option<String> {
        self.document
            .select(&CANONICAL_SELECTOR)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| self.absolute_url(href))
            .map(|u| u.to_string())
    }

    /// All `<a href>` elements in document order.
    pub fn anchors(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.document.select(&ANCHOR_SELECTOR)
    }
}

/// Which heading level to extract.
#[derive(Debug, Clone, Copy)]
pub enum HeadingLevel {
    H1,
    H2,
}

/// Handle passed to CSS callbacks.
pub struct HtmlElement<'a> {
    element: ElementRef<'a>,
    page: &'a ParsedPage,
    request: &'a Request,
    sink: &'a LinkSink,
}

impl<'a> HtmlElement<'a> {
    /// Attribute value by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Text content of the element, whitespace-collapsed.
    #[must_use]
    pub fn text(&self) -> String {
        collapse_whitespace(&self.element.text().collect::<String>())
    }

    /// Text of the first descendant matching the selector, empty when the
    /// selector is invalid or matches nothing.
    #[must_use]
    pub fn child_text(&self, selector: &str) -> String {
        let Ok(parsed) = Selector::parse(selector) else {
            return String::new();
        };
        self.element
            .select(&parsed)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .unwrap_or_default()
    }

    /// The underlying selection, for callbacks that need the full DOM API.
    #[must_use]
    pub fn dom(&self) -> ElementRef<'a> {
        self.element
    }

    /// The request that produced this page.
    #[must_use]
    pub fn request(&self) -> &Request {
        self.request
    }

    /// Resolve an href against the page's base URL.
    #[must_use]
    pub fn absolute_url(&self, href: &str) -> Option<Url> {
        self.page.absolute_url(href)
    }

    /// Queue an href for discovery; it re-enters admission with this page's
    /// depth + 1.
    pub fn visit(&self, href: &str) {
        if let Some(url) = self.page.absolute_url(href) {
            self.sink.push(url);
        }
    }
}

/// Run every registered CSS handler over the document, in insertion order.
pub fn run_html_handlers(
    page: &ParsedPage,
    request: &Request,
    handlers: &[Arc<HtmlHandler>],
    sink: &LinkSink,
) {
    for handler in handlers {
        for element in page.document.select(&handler.selector) {
            let handle = HtmlElement {
                element,
                page,
                request,
                sink,
            };
            (handler.callback)(&handle);
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
