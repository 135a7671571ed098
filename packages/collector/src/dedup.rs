//! Deduplication cache tiers.
//!
//! Three layers are consulted before a job counts as new: the in-run set
//! ([`RunCache`]), the persistent 48-hour cache ([`TtlCache`]) and the
//! permanent URL index owned by the archive store. All three key on the
//! same normalization so collisions are consistent across tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// The shared dedup key normalization: lowercase + trim.
pub fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase()
}

/// Same-run URL set. Prevents re-fetching a URL discovered through two
/// different keyword/country combinations in one pass. Safe for concurrent
/// insertion from batch workers; discarded when the run ends.
#[derive(Debug, Default)]
pub struct RunCache {
    seen: Mutex<HashSet<String>>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a URL. Returns true when it was not seen before in this run.
    pub fn insert(&self, url: &str) -> bool {
        self.seen.lock().unwrap().insert(normalize_url(url))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.lock().unwrap().contains(&normalize_url(url))
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().unwrap().is_empty()
    }
}

const CACHE_SCHEMA_VERSION: &str = "1.0";

/// On-disk shape of the persistent cache.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
    urls: Vec<String>,
    last_updated: DateTime<Utc>,
    metadata: CacheMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheMetadata {
    total_urls_cached: usize,
    version: String,
}

/// Persistent cross-run URL cache with coarse-grained expiry.
///
/// Expiry is evaluated once at load: when the stored `lastUpdated` is older
/// than the validity window the whole cache is discarded, not pruned
/// per-entry. URLs are inserted only after the corresponding downstream
/// delivery succeeded, so failed deliveries are retried on the next run.
#[derive(Debug)]
pub struct TtlCache {
    path: PathBuf,
    ttl: Duration,
    urls: HashSet<String>,
}

impl TtlCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            urls: HashSet::new(),
        }
    }

    /// Load the cache from disk. A missing or unreadable file, a corrupt
    /// payload, or a stale `lastUpdated` all yield an empty cache.
    pub async fn load(&mut self) {
        self.urls = match read_cache_file(&self.path).await {
            Some(file) => {
                let age = Utc::now().signed_duration_since(file.last_updated);
                if age.num_seconds() < 0 || age.to_std().map(|a| a > self.ttl).unwrap_or(true) {
                    tracing::info!(
                        path = %self.path.display(),
                        age_hours = age.num_hours(),
                        "URL cache expired, starting empty"
                    );
                    HashSet::new()
                } else {
                    tracing::info!(
                        path = %self.path.display(),
                        urls = file.urls.len(),
                        "URL cache loaded"
                    );
                    file.urls.iter().map(|u| normalize_url(u)).collect()
                }
            }
            None => HashSet::new(),
        };
    }

    /// Persist the cache. Failures are logged, never propagated: a lost
    /// cache write only means some re-notification on the next run.
    pub async fn save(&self) {
        let file = CacheFile {
            urls: self.urls.iter().cloned().collect(),
            last_updated: Utc::now(),
            metadata: CacheMetadata {
                total_urls_cached: self.urls.len(),
                version: CACHE_SCHEMA_VERSION.to_string(),
            },
        };

        let payload = match serde_json::to_vec_pretty(&file) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize URL cache");
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(e) = tokio::fs::write(&self.path, payload).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to save URL cache");
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(&normalize_url(url))
    }

    /// Mark a URL as processed. Call only after the downstream action for
    /// it has completed successfully.
    pub fn insert(&mut self, url: &str) {
        self.urls.insert(normalize_url(url));
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

async fn read_cache_file(path: &Path) -> Option<CacheFile> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt URL cache, ignoring");
            None
        }
    }
}
