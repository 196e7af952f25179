//! Response and redirect-hop types returned by the fetcher.

use reqwest::header::{CONTENT_TYPE, HeaderMap};
use url::Url;

use super::request::Request;

/// One followed 3xx hop.
///
/// The fetcher records every hop it takes; the crawler is responsible for
/// marking hop URLs visited and reporting them, strictly in hop order.
#[derive(Debug, Clone)]
pub struct RedirectHop {
    /// URL that answered with the 3xx.
    pub source: Url,
    /// 301, 302, 303, 307 or 308.
    pub status: u16,
    /// Response headers of the hop.
    pub headers: HeaderMap,
    /// Raw `Location` header value before resolution.
    pub location: String,
}

/// Final response of a fetch, carrying the ordered redirect chain.
///
/// `request` is the request that produced the final round-trip, so
/// `request.url` is the final URL. If the chain is non-empty its last
/// `location`, resolved against that hop's source, equals `request.url`.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: HeaderMap,
    pub request: Request,
    pub redirect_chain: Vec<RedirectHop>,
}

impl Response {
    /// The `Content-Type` header value, if readable.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Whether the response looks like an HTML document.
    #[must_use]
    pub fn is_html(&self) -> bool {
        match self.content_type() {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
            // Servers that omit the header almost always serve HTML pages.
            None => true,
        }
    }

    /// Whether the response looks like an XML document (sitemaps, feeds).
    #[must_use]
    pub fn is_xml(&self) -> bool {
        match self.content_type() {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("/xml") || ct.contains("+xml")
            }
            None => self.request.url.path().ends_with(".xml"),
        }
    }

    /// Whether the status is a success (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
