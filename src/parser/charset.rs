//! Charset detection and body decoding.
//!
//! Order of precedence: `charset` parameter of the `Content-Type` header,
//! then a `<meta>` sniff over the head of the document, then UTF-8. Bodies
//! in other encodings are re-decoded with `encoding_rs` so the rest of the
//! pipeline only ever sees UTF-8.

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::Regex;

/// `charset=` parameter inside a Content-Type value.
static HEADER_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)charset\s*=\s*[\x22']?([a-zA-Z0-9_\-]+)").expect("charset regex"));

/// `<meta charset=...>` / `<meta http-equiv content=...charset=...>` sniff.
static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([a-zA-Z0-9_\-]+)"#).expect("meta regex")
});

/// How many leading bytes to scan for a `<meta>` charset declaration.
const META_SNIFF_LIMIT: usize = 1024;

/// Decode a response body to UTF-8 text.
#[must_use]
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = detect_encoding(body, content_type);
    if encoding == UTF_8 {
        return String::from_utf8_lossy(body).into_owned();
    }
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn detect_encoding(body: &[u8], content_type: Option<&str>) -> &'static Encoding {
    if let Some(ct) = content_type
        && let Some(captures) = HEADER_CHARSET.captures(ct)
        && let Some(encoding) = Encoding::for_label(captures[1].as_bytes())
    {
        return encoding;
    }

    let head = &body[..body.len().min(META_SNIFF_LIMIT)];
    let head_text = String::from_utf8_lossy(head);
    if let Some(captures) = META_CHARSET.captures(&head_text)
        && let Some(encoding) = Encoding::for_label(captures[1].as_bytes())
    {
        return encoding;
    }

    UTF_8
}
