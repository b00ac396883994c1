//! Persistent cache for crawl results
//!
//! Every unit of work (a shard, a subdivision leaf term, a detail set)
//! is stored as one JSON file below the cache root. Entries are written
//! once and replaced atomically; nothing expires on its own.

mod shard_cache;

pub use shard_cache::ShardCache;

use crate::table::{ContentHash, ShardKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Address of one cache entry
///
/// The three namespaces get distinct file-name prefixes so that a shard,
/// a subdivision term and a content hash can never share a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Complete, deduplicated rows of one configured shard
    Shard(ShardKey),

    /// Rows of one subdivision leaf term
    Term(ShardKey),

    /// Detail records for a listing with this content hash
    Details(ContentHash),
}

impl CacheKey {
    pub fn file_name(&self) -> String {
        match self {
            Self::Shard(key) => format!("shard-{}.json", key.file_stem()),
            Self::Term(key) => format!("term-{}.json", key.file_stem()),
            Self::Details(hash) => format!("details-{}.json", hash.as_str()),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shard(key) => write!(f, "shard '{}'", key),
            Self::Term(key) => write!(f, "term '{}'", key),
            Self::Details(hash) => write!(f, "details {}", hash),
        }
    }
}

/// On-disk form of a cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub rows: Vec<T>,
}
