//! Cache management for resource listings
//!
//! Each entry is one JSON file `{cache_dir}/{name}.json` holding the data and
//! the time it was written. Readers accept entries of any age; freshness only
//! decides whether a background refresh is started.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Age after which a listing is refreshed in the background
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Cached data with the time it was stored
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub cached_at: DateTime<Utc>,
    pub data: T,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T) -> Self {
        Self {
            cached_at: Utc::now(),
            data,
        }
    }

    /// Time since the entry was stored; zero if the clock went backwards
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.age() < max_age
    }
}

/// Cache management struct
#[derive(Debug, Clone)]
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    /// Create a cache manager rooted at `cache_dir`, creating it if needed
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                AppError::CacheError(format!(
                    "Failed to create cache directory {}: {}",
                    cache_dir.display(),
                    e
                ))
            })?;
            info!("Created cache directory: {}", cache_dir.display());
        }
        Ok(Self { cache_dir })
    }

    /// Cache name of one listing: `<profile>-<region>-<kind>`
    pub fn data_name(profile: &str, region: &str, kind: &str) -> String {
        format!("{}-{}-{}", profile, region, kind)
    }

    pub fn entry_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    /// Read an entry regardless of age. A missing file is `None`; an
    /// unreadable one is logged and also `None` so the next refresh
    /// replaces it.
    pub fn cached_data<T: DeserializeOwned>(&self, name: &str) -> Option<CacheEntry<T>> {
        let path = self.entry_path(name);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache entry for {}", name);
                return None;
            }
            Err(e) => {
                warn!("Failed to read cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Discarding corrupt cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Store data atomically under an exclusive lock
    pub fn store<T: Serialize>(&self, name: &str, data: &T) -> Result<(), AppError> {
        let path = self.entry_path(name);
        let tmp_path = path.with_extension("json.tmp");
        let lock_path = path.with_extension("lock");

        let lock_file = fs::File::create(&lock_path)?;
        lock_file.lock_exclusive()?;

        let entry = CacheEntry::new(data);
        let json = serde_json::to_string(&entry)?;
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &path)?;

        lock_file.unlock()?;
        let _ = fs::remove_file(lock_path);

        info!("Cached {}", name);
        Ok(())
    }

    /// Delete every file for which `keep` returns false; returns how many
    /// files were removed
    pub fn clear(&self, keep: impl Fn(&str) -> bool) -> Result<usize, AppError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if keep(&file_name) {
                continue;
            }

            let path = entry.path();
            let result = if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        info!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    /// Clear everything except background job pid files
    pub fn clear_keeping_jobs(&self) -> Result<usize, AppError> {
        self.clear(|name| name.ends_with(".pid"))
    }
}
