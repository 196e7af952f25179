//! Per-host robots.txt cache.
//!
//! `robots.txt` is fetched lazily, once per host, through the fetcher
//! (bypassing admission), parsed once, and consulted on every admission
//! check against that host. A failed fetch yields an allow-all record with
//! a short negative TTL so a transient outage does not permanently blind
//! the crawl to the host's real policy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use texting_robots::Robot;
use url::Url;

use crate::fetcher::{Fetcher, Request};
use crate::utils::constants::ROBOTS_NEGATIVE_TTL_SECS;

/// How robots.txt policy is applied during admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RobotsMode {
    /// Reject URLs the host's robots.txt disallows.
    #[default]
    Respect,
    /// Allow everything but log what would have been blocked.
    IgnoreReport,
    /// Skip the robots check entirely.
    Ignore,
}

/// Parsed robots rules for one host.
///
/// `robot == None` means allow-all (missing file, fetch failure, or a 4xx
/// per RFC 9309).
pub struct RobotsRecord {
    robot: Option<Robot>,
    fetched_at: Instant,
    /// Set when the record stands in for a failed fetch and should be
    /// refreshed once the negative TTL lapses.
    negative: bool,
}

impl RobotsRecord {
    /// Whether the URL is allowed for our user agent.
    #[must_use]
    pub fn allowed(&self, url: &str) -> bool {
        match &self.robot {
            Some(robot) => robot.allowed(url),
            None => true,
        }
    }

    /// `Crawl-delay` directive, if the host set one. Embedders can install
    /// a matching `LimitRule` from this.
    #[must_use]
    pub fn crawl_delay(&self) -> Option<Duration> {
        self.robot
            .as_ref()
            .and_then(|r| r.delay)
            .map(Duration::from_secs_f32)
    }

    fn expired(&self) -> bool {
        self.negative && self.fetched_at.elapsed() > Duration::from_secs(ROBOTS_NEGATIVE_TTL_SECS)
    }
}

/// Lazily populated cache of per-host robots records.
pub struct RobotsCache {
    records: DashMap<String, Arc<RobotsRecord>>,
    user_agent: String,
}

impl RobotsCache {
    #[must_use]
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            records: DashMap::new(),
            user_agent: user_agent.into(),
        }
    }

    /// Whether the URL passes the host's robots policy, fetching and
    /// parsing the host's robots.txt on first use.
    pub async fn allowed(&self, fetcher: &Fetcher, url: &Url) -> bool {
        let record = self.record_for(fetcher, url).await;
        record.allowed(url.as_str())
    }

    /// `Crawl-delay` for the URL's host, if known and set.
    pub async fn crawl_delay(&self, fetcher: &Fetcher, url: &Url) -> Option<Duration> {
        self.record_for(fetcher, url).await.crawl_delay()
    }

    async fn record_for(&self, fetcher: &Fetcher, url: &Url) -> Arc<RobotsRecord> {
        let key = origin_key(url);

        if let Some(record) = self.records.get(&key) {
            if !record.expired() {
                return Arc::clone(record.value());
            }
        }

        // Concurrent first checks against a host may fetch twice; the
        // write-locked insert makes the last one win, which is harmless.
        let record = Arc::new(self.fetch_record(fetcher, url).await);
        self.records.insert(key, Arc::clone(&record));
        record
    }

    async fn fetch_record(&self, fetcher: &Fetcher, url: &Url) -> RobotsRecord {
        let robots_url = match url.join("/robots.txt") {
            Ok(u) => u,
            Err(e) => {
                warn!("cannot derive robots.txt URL from {url}: {e}");
                return RobotsRecord {
                    robot: None,
                    fetched_at: Instant::now(),
                    negative: true,
                };
            }
        };

        let mut request = Request::get(robots_url.clone(), 0);
        request.check_revisit = false;

        match fetcher.fetch(request).await {
            Ok(response) if response.is_success() => {
                let robot = match Robot::new(&self.user_agent, &response.body) {
                    Ok(robot) => Some(robot),
                    Err(e) => {
                        warn!("unparseable robots.txt at {robots_url}: {e}");
                        None
                    }
                };
                debug!("parsed robots.txt for {}", origin_key(url));
                RobotsRecord {
                    robot,
                    fetched_at: Instant::now(),
                    negative: false,
                }
            }
            Ok(response) if response.status >= 500 => {
                debug!(
                    "robots.txt at {robots_url} answered {}, allowing all with negative TTL",
                    response.status
                );
                RobotsRecord {
                    robot: None,
                    fetched_at: Instant::now(),
                    negative: true,
                }
            }
            // 4xx: no crawl restrictions, cached for the crawl's lifetime.
            Ok(_) => RobotsRecord {
                robot: None,
                fetched_at: Instant::now(),
                negative: false,
            },
            Err(e) => {
                debug!("robots.txt fetch failed for {robots_url}: {e}, allowing all");
                RobotsRecord {
                    robot: None,
                    fetched_at: Instant::now(),
                    negative: true,
                }
            }
        }
    }
}

fn origin_key(url: &Url) -> String {
    format!(
        "{}://{}",
        url.scheme(),
        url.host_str().unwrap_or_default().to_ascii_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_allows_when_no_rules() {
        let record = RobotsRecord {
            robot: None,
            fetched_at: Instant::now(),
            negative: false,
        };
        assert!(record.allowed("https://example.com/anything"));
        assert_eq!(record.crawl_delay(), None);
    }

    #[test]
    fn record_applies_parsed_rules() {
        let txt = b"User-agent: *\nDisallow: /disallowed\nCrawl-delay: 2\n";
        let robot = Robot::new("bluesnake", txt).unwrap();
        let record = RobotsRecord {
            robot: Some(robot),
            fetched_at: Instant::now(),
            negative: false,
        };

        assert!(record.allowed("https://example.com/open"));
        assert!(!record.allowed("https://example.com/disallowed"));
        assert!(!record.allowed("https://example.com/disallowed/sub"));
        assert_eq!(record.crawl_delay(), Some(Duration::from_secs(2)));
    }
}
