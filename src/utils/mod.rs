//! Shared utilities for the crawl engine.

pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{extract_host, is_fetchable_url, normalize_url};
