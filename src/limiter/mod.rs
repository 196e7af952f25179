//! Per-domain rate limiting: concurrency permits plus inter-request delays.
//!
//! Rules are installed at configuration time and scanned in insertion order
//! against the request host; the first match wins. A matching rule bounds
//! concurrency with a semaphore sized `max(1, parallelism)` and enforces a
//! delay of `delay + Uniform[0, random_delay)` after each request, *before*
//! the permit is released. Hosts with no matching rule are unconstrained
//! (the global worker pool still bounds total concurrency).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::CrawlError;

/// A rate-limit rule as configured by the embedder.
///
/// Exactly one of `domain_regex` / `domain_glob` must be set; the glob form
/// compiles `*` to `.*` and anchors the pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitRule {
    /// Regex matched against the request host.
    pub domain_regex: Option<String>,
    /// Glob matched against the request host (`*.example.com`).
    pub domain_glob: Option<String>,
    /// Fixed delay enforced after each request to a matching host.
    #[serde(default)]
    pub delay: Duration,
    /// Upper bound of the uniformly random extra delay.
    #[serde(default)]
    pub random_delay: Duration,
    /// Maximum concurrent requests to matching hosts. Values below 1 are
    /// treated as 1.
    #[serde(default)]
    pub parallelism: usize,
}

/// Compile a glob pattern into an anchored regex (`*` matches any sequence).
fn compile_glob_pattern(pattern: &str) -> Result<Regex, CrawlError> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    let anchored = format!("^{escaped}$");
    Regex::new(&anchored).map_err(|e| CrawlError::Config(format!("invalid glob '{pattern}': {e}")))
}

/// A rule with its matcher compiled and its permit channel allocated.
struct CompiledRule {
    matcher: Regex,
    delay: Duration,
    random_delay: Duration,
    semaphore: Arc<Semaphore>,
}

/// Permit for one in-flight request under a matching rule.
///
/// Callers execute the request while holding the permit, then call
/// [`RatePermit::release`] which sleeps out the configured delay before
/// freeing the slot. Dropping without `release` frees the slot immediately
/// (used on error paths).
pub struct RatePermit {
    _permit: OwnedSemaphorePermit,
    delay: Duration,
    random_delay: Duration,
}

impl RatePermit {
    /// Sleep `delay + Uniform[0, random_delay)` and free the permit.
    pub async fn release(self) {
        let mut total = self.delay;
        if !self.random_delay.is_zero() {
            let jitter = rand::rng().random_range(0.0..1.0);
            total += Duration::from_secs_f64(self.random_delay.as_secs_f64() * jitter);
        }
        if !total.is_zero() {
            tokio::time::sleep(total).await;
        }
    }
}

/// Ordered table of rate-limit rules.
///
/// Reads take a short read lock to clone the matching rule handle; rules are
/// mutated only during configuration, never on the hot path.
#[derive(Default)]
pub struct RateLimiter {
    rules: RwLock<Vec<Arc<CompiledRule>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and append a rule. Rules are matched in insertion order.
    pub fn add_rule(&self, rule: &LimitRule) -> Result<(), CrawlError> {
        let matcher = match (&rule.domain_regex, &rule.domain_glob) {
            (Some(re), _) => Regex::new(re)
                .map_err(|e| CrawlError::Config(format!("invalid limit rule regex: {e}")))?,
            (None, Some(glob)) => compile_glob_pattern(glob)?,
            (None, None) => {
                return Err(CrawlError::Config(
                    "limit rule needs a domain_regex or domain_glob".into(),
                ));
            }
        };

        let parallelism = rule.parallelism.max(1);
        self.rules.write().push(Arc::new(CompiledRule {
            matcher,
            delay: rule.delay,
            random_delay: rule.random_delay,
            semaphore: Arc::new(Semaphore::new(parallelism)),
        }));
        Ok(())
    }

    /// Number of installed rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    /// Whether any rule matches the host (first match wins).
    #[must_use]
    pub fn has_matching_rule(&self, host: &str) -> bool {
        self.rules.read().iter().any(|r| r.matcher.is_match(host))
    }

    /// Acquire a permit for the host, waiting if the matching rule's budget
    /// is exhausted. Returns `None` when no rule matches.
    pub async fn acquire(&self, host: &str) -> Option<RatePermit> {
        let rule = {
            let rules = self.rules.read();
            rules.iter().find(|r| r.matcher.is_match(host)).cloned()
        }?;

        // acquire_owned only fails if the semaphore is closed, which never
        // happens: the limiter owns every semaphore for its whole lifetime.
        let permit = rule
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("rate limiter semaphore closed");

        Some(RatePermit {
            _permit: permit,
            delay: rule.delay,
            random_delay: rule.random_delay,
        })
    }
}
