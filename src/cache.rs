//! Disk-backed cache of API responses.
//!
//! Responses are keyed by a request fingerprint and stored in a single JSON
//! document. Expiry is collection-wide: once the cache is older than its
//! window, every entry is dropped and the clock restarts.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// On-disk layout of the cache file
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    created_at: DateTime<Utc>,
    #[serde(default)]
    entries: BTreeMap<String, Value>,
}

/// Compute the fingerprint of a request: endpoint plus parameters sorted by key.
pub fn fingerprint(endpoint: &str, params: &[(&str, String)]) -> String {
    let mut sorted: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
    sorted.sort();

    let query = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    hasher.update(b"?");
    hasher.update(query.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Time-boxed response cache persisted as one JSON file.
#[derive(Debug)]
pub struct ResponseCache {
    path: Option<PathBuf>,
    ttl: chrono::Duration,
    created_at: DateTime<Utc>,
    entries: BTreeMap<String, Value>,
}

impl ResponseCache {
    /// An empty cache that is never written to disk.
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            path: None,
            ttl: to_chrono(ttl),
            created_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the cache from `path`.
    ///
    /// A missing, unreadable, corrupt or expired file yields an empty cache
    /// bound to the same path.
    pub fn load(path: PathBuf, ttl: Duration) -> Self {
        let ttl = to_chrono(ttl);
        let fresh = |path: PathBuf| Self {
            path: Some(path),
            ttl,
            created_at: Utc::now(),
            entries: BTreeMap::new(),
        };

        if !path.exists() {
            debug!(path = %path.display(), "Cache file not found, starting empty");
            return fresh(path);
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(crate::error::GapError::from)
            .and_then(|content| Ok(serde_json::from_str::<CacheFile>(&content)?));

        match parsed {
            Ok(file) => {
                if Utc::now() - file.created_at > ttl {
                    info!(created_at = %file.created_at, "Cache expired, starting empty");
                    return fresh(path);
                }
                info!(entries = file.entries.len(), path = %path.display(), "Loaded response cache");
                Self {
                    path: Some(path),
                    ttl,
                    created_at: file.created_at,
                    entries: file.entries,
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable cache");
                fresh(path)
            }
        }
    }

    /// Cache file location, if persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Creation time of the current cache generation.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a stored response.
    pub fn get(&mut self, key: &str) -> Option<&Value> {
        self.expire_if_stale();
        self.entries.get(key)
    }

    /// Store a response under `key`.
    pub fn insert(&mut self, key: String, value: Value) {
        self.expire_if_stale();
        self.entries.insert(key, value);
    }

    /// Drop every entry and restart the expiry clock.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.created_at = Utc::now();
    }

    fn expire_if_stale(&mut self) {
        if Utc::now() - self.created_at > self.ttl {
            info!(entries = self.entries.len(), "Cache window elapsed, restarting empty");
            self.clear();
        }
    }

    /// Write the whole cache to disk (temp file + rename).
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = CacheFile {
            created_at: self.created_at,
            entries: self.entries.clone(),
        };
        let content = serde_json::to_string(&file)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;

        debug!(entries = self.entries.len(), path = %path.display(), "Saved response cache");
        Ok(())
    }
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX)
}
