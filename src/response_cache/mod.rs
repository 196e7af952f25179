//! Content-addressed on-disk cache of GET responses.
//!
//! Entries live under `{cache_dir}/{sha1(url)[..2]}/{sha1(url)}` as JSON
//! (status, header pairs, base64 body). Freshness is judged by file mtime
//! against the configured TTL; a TTL of zero never expires. Writes go to a
//! `{file}~` temp path followed by an atomic rename, so concurrent writers
//! to the same key end as last-write-wins with no torn files.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::CrawlError;

/// Serialized form of a cached response.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    status: u16,
    headers: Vec<(String, String)>,
    body_b64: String,
}

/// A response restored from disk.
#[derive(Debug)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// On-disk response cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache over `dir` with the given TTL (zero = never expires).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// Shard path for a URL: first two hex chars of the SHA-1 digest form
    /// the directory, the full digest the filename.
    #[must_use]
    pub fn entry_path(&self, url: &str) -> PathBuf {
        let mut hasher = Sha1::new();
        hasher.update(url.as_bytes());
        let digest = hex::encode(hasher.finalize());
        self.dir.join(&digest[..2]).join(&digest)
    }

    /// Load a fresh entry for the URL, or `None` on miss, staleness, or a
    /// decode failure (a corrupt entry is treated as a miss and will be
    /// overwritten by the next successful fetch).
    pub async fn load(&self, url: &str) -> Option<CachedResponse> {
        let path = self.entry_path(url);

        let meta = tokio::fs::metadata(&path).await.ok()?;
        if !self.ttl.is_zero() {
            let mtime = meta.modified().ok()?;
            let age = SystemTime::now().duration_since(mtime).unwrap_or_default();
            if age > self.ttl {
                debug!("cache entry stale for {url} (age {age:?})");
                return None;
            }
        }

        let raw = tokio::fs::read(&path).await.ok()?;
        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("discarding corrupt cache entry {}: {e}", path.display());
                return None;
            }
        };

        let body = BASE64.decode(entry.body_b64.as_bytes()).ok()?;
        Some(CachedResponse {
            status: entry.status,
            headers: headers_from_pairs(&entry.headers),
            body,
        })
    }

    /// Persist a response under the URL's key via temp-then-rename.
    pub async fn store(
        &self,
        url: &str,
        status: u16,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), CrawlError> {
        let path = self.entry_path(url);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entry = CacheEntry {
            status,
            headers: headers_to_pairs(headers),
            body_b64: BASE64.encode(body),
        };
        let encoded = serde_json::to_vec(&entry)
            .map_err(|e| CrawlError::Parse(format!("cache entry encode: {e}")))?;

        let tmp = temp_path(&path);
        tokio::fs::write(&tmp, &encoded).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("cached {url} -> {}", path.display());
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push("~");
    path.with_file_name(name)
}

fn headers_to_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn headers_from_pairs(pairs: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            map.append(name, value);
        }
    }
    map
}
