use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::CacheError;
use crate::net::FetchResponse;

/// Extension used for persisted cache files
const CACHE_FILE_EXT: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(with = "body_base64")]
    pub body: Vec<u8>,
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn from_response(url: &str, response: &FetchResponse) -> Self {
        Self {
            url: url.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.to_vec(),
            cached_at: Utc::now(),
        }
    }

    pub fn to_response(&self) -> FetchResponse {
        FetchResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: Bytes::from(self.body.clone()),
            from_cache: true,
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

mod body_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// One named cache: request URL -> stored response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cache {
    pub name: String,
    entries: BTreeMap<String, CachedResponse>,
}

impl Cache {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: BTreeMap::new(),
        }
    }

    pub fn match_url(&self, url: &str) -> Option<&CachedResponse> {
        self.entries.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn put(&mut self, entry: CachedResponse) {
        self.entries.insert(entry.url.clone(), entry);
    }

    /// Stored URLs in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CachedResponse> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of stored bodies in bytes
    pub fn body_bytes(&self) -> usize {
        self.entries.values().map(|e| e.body.len()).sum()
    }
}

/// The set of named caches, optionally backed by a directory on disk.
pub struct CacheStorage {
    dir: Option<PathBuf>,
    caches: HashMap<String, Cache>,
}

impl CacheStorage {
    /// Storage that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            caches: HashMap::new(),
        }
    }

    /// Open storage rooted at `dir`, loading every cache persisted there.
    /// Unreadable cache files are skipped with a warning.
    pub fn open_dir(dir: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&dir)?;

        let mut caches = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CACHE_FILE_EXT) {
                continue;
            }
            match Self::load_file(&path) {
                Ok(cache) => {
                    debug!(cache = %cache.name, entries = cache.len(), "Loaded cache");
                    caches.insert(cache.name.clone(), cache);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable cache file");
                }
            }
        }

        Ok(Self {
            dir: Some(dir),
            caches,
        })
    }

    fn load_file(path: &Path) -> anyhow::Result<Cache> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn validate_name(name: &str) -> Result<(), CacheError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if valid {
            Ok(())
        } else {
            Err(CacheError::InvalidName(name.to_string()))
        }
    }

    fn cache_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.{}", name, CACHE_FILE_EXT))
    }

    /// Write a cache to disk via a temp file and rename, so readers see either
    /// the old file or the complete new one.
    fn persist(&self, cache: &Cache) -> Result<(), CacheError> {
        let Some(dir) = self.dir.as_deref() else {
            return Ok(());
        };

        let path = Self::cache_path(dir, &cache.name);
        let tmp = dir.join(format!(".{}.{}.tmp", cache.name, CACHE_FILE_EXT));
        let contents = serde_json::to_string(cache).map_err(|source| CacheError::Encode {
            name: cache.name.clone(),
            source,
        })?;

        std::fs::write(&tmp, contents).map_err(|source| CacheError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Open a cache, creating (and persisting) it empty if it does not exist.
    pub fn open(&mut self, name: &str) -> Result<&Cache, CacheError> {
        Self::validate_name(name)?;
        if !self.caches.contains_key(name) {
            let cache = Cache::new(name);
            self.persist(&cache)?;
            info!(cache = name, "Created cache");
            self.caches.insert(name.to_string(), cache);
        }
        self.caches
            .get(name)
            .ok_or_else(|| CacheError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Cache names in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.caches.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn match_url(&self, name: &str, url: &str) -> Option<&CachedResponse> {
        self.caches.get(name).and_then(|c| c.match_url(url))
    }

    /// Add `entries` to the named cache as a single unit. The new contents are
    /// persisted before they become visible; on error nothing changes.
    pub fn commit(&mut self, name: &str, entries: Vec<CachedResponse>) -> Result<(), CacheError> {
        Self::validate_name(name)?;

        let mut next = self
            .caches
            .get(name)
            .cloned()
            .unwrap_or_else(|| Cache::new(name));
        let added = entries.len();
        for entry in entries {
            next.put(entry);
        }

        self.persist(&next)?;
        debug!(cache = name, added, total = next.len(), "Committed cache entries");
        self.caches.insert(name.to_string(), next);
        Ok(())
    }

    /// Delete a cache. Returns false if it did not exist.
    pub fn delete(&mut self, name: &str) -> Result<bool, CacheError> {
        if self.caches.remove(name).is_none() {
            return Ok(false);
        }
        if let Some(dir) = self.dir.as_deref() {
            let path = Self::cache_path(dir, name);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        info!(cache = name, "Deleted cache");
        Ok(true)
    }

    /// Delete every cache except `keep`, returning the names removed.
    pub fn retain_only(&mut self, keep: &str) -> Result<Vec<String>, CacheError> {
        let stale: Vec<String> = self
            .caches
            .keys()
            .filter(|name| name.as_str() != keep)
            .cloned()
            .collect();
        for name in &stale {
            self.delete(name)?;
        }
        Ok(stale)
    }
}

// ============================================================================
// Tests
// ============================================================================
