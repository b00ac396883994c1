//! Roster-Sweep: a cached, two-phase registry crawler
//!
//! This crate enumerates the entries of paginated, rate-limited professional
//! registry listings shard by shard, fetches a detail page for every entry,
//! and joins both into one flat table. Every unit of work is cached on disk
//! so repeated runs are incremental.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod fetcher;
pub mod output;
pub mod sites;
pub mod table;

use thiserror::Error;

/// Main error type for Roster-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetcher::FetchError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Site error: {0}")]
    Site(#[from] sites::SiteError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pagination is inconsistent for shard '{shard}' at page {page}: {reason}")]
    PaginationAmbiguity {
        shard: String,
        page: u32,
        reason: String,
    },

    #[error("Shard '{shard}' failed: {source}")]
    Shard {
        shard: String,
        #[source]
        source: Box<SweepError>,
    },

    #[error("Detail fetch for '{identifier}' failed: {source}")]
    Detail {
        identifier: String,
        #[source]
        source: Box<SweepError>,
    },

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Unknown site: {0}")]
    UnknownSite(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Roster-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Concurrency, Config};
pub use crawler::CrawlOrchestrator;
pub use output::CrawlReport;
pub use table::{ContentHash, DetailRecord, JoinedTable, ListingRow, ShardKey};
