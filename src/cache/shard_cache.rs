//! File-per-key cache store
//!
//! This module provides the read-through/write-through store used by the
//! listing and detail stages.

use crate::cache::{CacheEntry, CacheError, CacheKey, CacheResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Borrowed twin of `CacheEntry` used for writing
#[derive(Serialize)]
struct EntryRef<'a, T> {
    key: String,
    created_at: DateTime<Utc>,
    rows: &'a [T],
}

/// Cache rooted at one directory, one JSON file per key
///
/// Workers never share a key, so reads and writes need no locking. Writes
/// go to a temporary sibling first and are renamed into place, which
/// means a reader sees either the old entry or the new one.
#[derive(Debug, Clone)]
pub struct ShardCache {
    root: PathBuf,
}

impl ShardCache {
    /// Creates a cache rooted at `root`; the directory is created on first store
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Loads the full entry for `key`
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No entry exists
    /// * `Ok(Some(entry))` - The stored entry
    /// * `Err(CacheError::Corrupt)` - The file exists but cannot be parsed
    pub fn load_entry<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> CacheResult<Option<CacheEntry<T>>> {
        let path = self.path_for(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CacheError::Corrupt { path, source })
    }

    /// Loads the rows stored under `key`
    pub fn load<T: DeserializeOwned>(&self, key: &CacheKey) -> CacheResult<Option<Vec<T>>> {
        Ok(self.load_entry(key)?.map(|entry| entry.rows))
    }

    /// Loads the rows stored under `key`, treating any failure as a miss
    ///
    /// A corrupt entry is logged and will be overwritten by the next store.
    pub fn load_or_miss<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<Vec<T>> {
        match self.load(key) {
            Ok(Some(rows)) => {
                tracing::debug!("Cache hit for {}", key);
                Some(rows)
            }
            Ok(None) => {
                tracing::debug!("Cache miss for {}", key);
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache entry for {}: {}", key, e);
                None
            }
        }
    }

    /// Serializes `rows` and stores them under `key`, replacing any previous entry
    pub fn store<T: Serialize>(&self, key: &CacheKey, rows: &[T]) -> CacheResult<()> {
        std::fs::create_dir_all(&self.root)?;

        let entry = EntryRef {
            key: key.to_string(),
            created_at: Utc::now(),
            rows,
        };
        let bytes = serde_json::to_vec(&entry)?;

        let path = self.path_for(key);
        let temp = self.root.join(format!(
            ".{}.{}.{}.tmp",
            key.file_name(),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = std::fs::write(&temp, &bytes) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
        if let Err(e) = std::fs::rename(&temp, &path) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }

        tracing::debug!("Stored {} rows for {}", rows.len(), key);
        Ok(())
    }

    /// Whether an entry file exists for `key`
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }
}
