//! Redirect state machine helpers.
//!
//! The transport never follows redirects on its own; each hop is decided
//! here so the crawler sees every intermediate URL. Per-method 3xx
//! semantics: 307/308 preserve method and body, 301/302/303 convert to GET
//! with no body. Headers are copied across hops, with `Authorization`
//! dropped whenever the origin (scheme, host, port) changes.

use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use url::Url;

use super::request::Request;

/// Decision returned by a redirect callback for one hop.
#[derive(Debug, Clone)]
pub enum RedirectDecision {
    /// Follow the hop (default when no callback is installed).
    Follow,
    /// Stop following: the current 3xx response becomes the final response.
    Stop,
    /// Abort the fetch; the message surfaces to the caller.
    Abort(String),
}

/// Whether this 3xx status preserves the request method and body.
#[must_use]
pub fn preserves_method(status: u16) -> bool {
    matches!(status, 307 | 308)
}

/// Build the request for the next hop.
#[must_use]
pub fn next_request(previous: &Request, status: u16, destination: Url) -> Request {
    let (method, body) = if preserves_method(status) {
        (previous.method.clone(), previous.body.clone())
    } else {
        (Method::GET, None)
    };

    let mut headers = previous.headers.clone();
    if !same_origin(&previous.url, &destination) {
        headers.remove(AUTHORIZATION);
    }

    Request {
        url: destination,
        method,
        depth: previous.depth,
        headers,
        body,
        check_revisit: previous.check_revisit,
    }
}

/// Origin comparison for the credential strip: scheme, host and port. A
/// port change on the same host also drops credentials, matching the
/// transport's own sensitive-header behavior.
fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}
