//! Table model shared by every crawl stage
//!
//! This module defines:
//! - `ShardKey`: a validated partition key of the listing space
//! - `ListingRow` / `DetailRecord`: the rows produced by the two crawl phases
//! - `ContentHash`: the fingerprint of a listing used to key the detail cache
//! - First-seen deduplication and the final listing/detail join

mod join;

pub use join::{join, JoinedRow, JoinedTable};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Separator inserted between name parts when a term is subdivided
pub const TERM_SEPARATOR: char = ' ';

/// A shard key failed validation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid shard key '{key}': {reason}")]
pub struct InvalidShardKey {
    pub key: String,
    pub reason: &'static str,
}

/// A partition of the listing space, e.g. `"a"`, `"ab"` or `"ab c"`
///
/// Keys are lowercase ASCII letters, digits and hyphens, with at most one
/// inner separator. That keeps every key filesystem-safe once the
/// separator is mapped to `_` (which can never occur in a key itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardKey(String);

impl ShardKey {
    pub fn new(key: impl Into<String>) -> Result<Self, InvalidShardKey> {
        let key = key.into();
        let reject = |reason| {
            Err(InvalidShardKey {
                key: key.clone(),
                reason,
            })
        };

        if key.is_empty() {
            return reject("key cannot be empty");
        }
        if !key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == TERM_SEPARATOR)
        {
            return reject("only lowercase letters, digits, '-' and a single space are allowed");
        }
        if key.starts_with(TERM_SEPARATOR) || key.ends_with(TERM_SEPARATOR) {
            return reject("key cannot start or end with a space");
        }
        if key.matches(TERM_SEPARATOR).count() > 1 {
            return reject("key can contain at most one space");
        }

        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters in the key
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_separator(&self) -> bool {
        self.0.contains(TERM_SEPARATOR)
    }

    /// Child key with `c` appended
    pub fn extend(&self, c: char) -> Self {
        Self(format!("{}{}", self.0, c))
    }

    /// Child key with a separator and `c` appended
    pub fn extend_after_separator(&self, c: char) -> Self {
        Self(format!("{}{}{}", self.0, TERM_SEPARATOR, c))
    }

    /// File-name form of the key
    pub fn file_stem(&self) -> String {
        self.0.replace(TERM_SEPARATOR, "_")
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a registry listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRow {
    /// Unique reference of the entry (detail URL or member number); the join key
    pub identifier: String,

    /// Remaining listing columns
    pub columns: BTreeMap<String, String>,
}

impl ListingRow {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            columns: BTreeMap::new(),
        }
    }

    /// Builder-style column insert
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}

/// Fields scraped from one entry's detail page
///
/// A field missing from `fields` is "not present"; an empty string means
/// the page showed the field with no content.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetailRecord {
    pub identifier: String,
    pub fields: BTreeMap<String, String>,
}

impl DetailRecord {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_fields(identifier: impl Into<String>, fields: BTreeMap<String, String>) -> Self {
        Self {
            identifier: identifier.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Hex-encoded SHA-256 fingerprint of a listing table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hashes identifiers and columns in table order
    ///
    /// Every string is length-prefixed so that no two distinct tables
    /// produce the same byte stream.
    pub fn of_listing(rows: &[ListingRow]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((rows.len() as u64).to_le_bytes());
        for row in rows {
            feed(&mut hasher, &row.identifier);
            hasher.update((row.columns.len() as u64).to_le_bytes());
            for (column, value) in &row.columns {
                feed(&mut hasher, column);
                feed(&mut hasher, value);
            }
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn feed(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Drops every row whose identifier was already seen, keeping the first
pub fn dedup_first_seen(rows: impl IntoIterator<Item = ListingRow>) -> Vec<ListingRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.identifier.clone()))
        .collect()
}
