//! URL normalization and classification helpers.
//!
//! Canonicalization happens once, at admission time; everything downstream
//! (fingerprints, the visited store, the response cache) hashes the already
//! normalized string so equivalent spellings of a URL collapse to one entry.

use once_cell::sync::Lazy;
use url::Url;

/// Query parameters that identify a visitor or campaign rather than a
/// resource. Stripped during normalization when the config asks for it.
static TRACKING_PARAMS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "gclid", "fbclid", "msclkid", "igshid", "mc_cid", "mc_eid", "phpsessid", "jsessionid",
    ]
});

/// Check whether a raw href is even a candidate for fetching.
///
/// Filters pseudo-URLs (`javascript:`, `mailto:`, `data:`, `tel:`) and
/// empty fragments before the more expensive parse in `normalize_url`.
#[must_use]
pub fn is_fetchable_url(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return false;
    }
    let lower = trimmed.to_ascii_lowercase();
    !(lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("data:")
        || lower.starts_with("tel:"))
}

/// Parse and canonicalize a URL for admission and fingerprinting.
///
/// The `url` crate already lowercases scheme and host, removes default
/// ports and collapses `..`/`.` segments on parse; on top of that the
/// fragment is dropped and, when `strip_tracking` is set, tracking query
/// parameters are removed (keeping the remaining ones in order).
pub fn normalize_url(raw: &str, strip_tracking: bool) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw.trim())?;
    url.set_fragment(None);

    if strip_tracking && url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !is_tracking_param(k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            let query = kept
                .iter()
                .map(|(k, v)| {
                    if v.is_empty() {
                        k.clone()
                    } else {
                        format!("{k}={v}")
                    }
                })
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
    }

    Ok(url)
}

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

/// Extract the lowercased host from a URL, if any.
#[must_use]
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(str::to_ascii_lowercase)
}

/// Match a host against a configured domain: exact match or subdomain.
#[must_use]
pub fn host_matches_domain(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}
