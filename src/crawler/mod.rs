//! Crawl engine
//!
//! This module contains the core crawling logic, including:
//! - The bounded worker pool both phases run on
//! - Locating a shard in a sorted, paginated listing
//! - Enumerating shards by page walk or by term subdivision
//! - Fetching and caching the detail set
//! - Overall crawl coordination

mod coordinator;
mod details;
mod enumerator;
mod locator;
mod pool;
#[cfg(test)]
mod synthetic;

pub use coordinator::{CrawlOptions, CrawlOrchestrator};
pub use details::{DetailFetcher, DetailSet};
pub use enumerator::{Jitter, ListEnumerator, Listing, ShardListing, SubdivisionSettings};
pub use locator::locate_first_page;
pub use pool::run_pool;
