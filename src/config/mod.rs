//! Crawl configuration.
//!
//! `CrawlConfig` is built through `CrawlConfig::builder()`. Optional fields
//! use `Option<T>` so that "unset" is distinguishable from an explicit
//! zero: supplying a user agent never silently zeroes the body-size limit,
//! and `max_body_size(0)` explicitly means unlimited.

pub mod builder;
pub mod getters;
pub mod types;

pub use builder::CrawlConfigBuilder;
pub use types::CrawlConfig;
