//! Listing enumeration for one shard
//!
//! A shard is enumerated in one of three ways, depending on the site:
//! - page walk: find the shard's first page by binary search, then walk
//!   forward until the listing moves past the shard
//! - walk all: the listing for the shard key holds only that shard, so
//!   every reported page is read
//! - subdivision: query the shard key as a search term and, whenever the
//!   server truncates the answer, replace the term by its one-character
//!   extensions until every query fits under the cap
//!
//! Completed shards and subdivision leaf terms are cached, so a rerun only
//! fetches what an earlier run did not finish.

use crate::cache::{CacheKey, ShardCache};
use crate::crawler::locator::locate_first_page;
use crate::fetcher::RetryingFetcher;
use crate::sites::{ListingPage, ListingSite, ListingStrategy, ShardOrdering};
use crate::table::{dedup_first_seen, ListingRow, ShardKey};
use crate::SweepError;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A listing site together with the fetcher used to read it
#[derive(Clone)]
pub struct Listing {
    site: Arc<dyn ListingSite>,
    fetcher: RetryingFetcher,
}

impl Listing {
    pub fn new(site: Arc<dyn ListingSite>, fetcher: RetryingFetcher) -> Self {
        Self { site, fetcher }
    }

    pub fn site(&self) -> &dyn ListingSite {
        self.site.as_ref()
    }

    /// Fetches and parses one listing page
    ///
    /// A page that does not parse is retried like a failed request.
    pub async fn fetch_page(&self, term: &ShardKey, page: u32) -> Result<ListingPage, SweepError> {
        let url = self.site.listing_url(term, page);
        debug!("Fetching listing page {}", url);
        let site = &self.site;
        let page = self
            .fetcher
            .fetch_with(&url, |document| site.parse_listing(document))
            .await?;
        Ok(page)
    }
}

/// Random extra pause between subdivision fetches
#[derive(Debug, Clone, PartialEq)]
pub struct Jitter {
    pub probability: f64,
    pub pause: Duration,
}

impl Jitter {
    pub fn none() -> Self {
        Self {
            probability: 0.0,
            pause: Duration::ZERO,
        }
    }

    async fn maybe_pause(&self) {
        if self.probability <= 0.0 || self.pause.is_zero() {
            return;
        }
        let pause = rand::thread_rng().gen_bool(self.probability.min(1.0));
        if pause {
            debug!("Jitter pause of {:?}", self.pause);
            tokio::time::sleep(self.pause).await;
        }
    }
}

/// Tuning for the subdivision strategy
#[derive(Debug, Clone)]
pub struct SubdivisionSettings {
    /// Characters appended to an overflowing term
    pub alphabet: Vec<char>,

    /// Maximum number of extensions below the shard key
    pub max_depth: u32,

    pub jitter: Jitter,
}

impl Default for SubdivisionSettings {
    fn default() -> Self {
        Self {
            alphabet: ('a'..='z').collect(),
            max_depth: 4,
            jitter: Jitter::none(),
        }
    }
}

/// Outcome of enumerating one shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardListing {
    pub shard: ShardKey,

    /// Deduplicated rows in listing order
    pub rows: Vec<ListingRow>,

    /// The rows came from the cache without any fetch
    pub from_cache: bool,

    /// Terms that still overflowed at the maximum depth; their rows are partial
    pub exhausted_terms: Vec<ShardKey>,
}

impl ShardListing {
    pub fn is_complete(&self) -> bool {
        self.exhausted_terms.is_empty()
    }
}

/// Enumerates listing rows shard by shard
pub struct ListEnumerator {
    listing: Listing,
    cache: ShardCache,
    subdivision: SubdivisionSettings,
}

impl ListEnumerator {
    pub fn new(listing: Listing, cache: ShardCache, subdivision: SubdivisionSettings) -> Self {
        Self {
            listing,
            cache,
            subdivision,
        }
    }

    /// Returns every listing row of `shard`, from the cache when possible
    ///
    /// A complete result is written to the cache before returning. A result
    /// with exhausted terms is returned but not cached, so a later run can
    /// finish it.
    pub async fn enumerate(&self, shard: &ShardKey) -> Result<ShardListing, SweepError> {
        let key = CacheKey::Shard(shard.clone());
        if let Some(rows) = self.cache.load_or_miss::<ListingRow>(&key) {
            debug!("Shard '{}' served from cache ({} rows)", shard, rows.len());
            return Ok(ShardListing {
                shard: shard.clone(),
                rows,
                from_cache: true,
                exhausted_terms: Vec::new(),
            });
        }

        let (rows, exhausted_terms) = match self.listing.site().strategy() {
            ListingStrategy::PageWalk => (self.walk_pages(shard).await?, Vec::new()),
            ListingStrategy::Subdivide => self.subdivide(shard).await?,
            ListingStrategy::WalkAll => (self.walk_all(shard).await?, Vec::new()),
        };
        let rows = dedup_first_seen(rows);

        if exhausted_terms.is_empty() {
            self.cache.store(&key, &rows)?;
            info!("Shard '{}' enumerated: {} rows", shard, rows.len());
        } else {
            warn!(
                "Shard '{}' is incomplete: {} terms still overflow; keeping {} rows uncached",
                shard,
                exhausted_terms.len(),
                rows.len()
            );
        }

        Ok(ShardListing {
            shard: shard.clone(),
            rows,
            from_cache: false,
            exhausted_terms,
        })
    }

    async fn walk_pages(&self, shard: &ShardKey) -> Result<Vec<ListingRow>, SweepError> {
        let first = self.listing.fetch_page(shard, 1).await?;
        let total_pages = first.total_pages;
        if total_pages == 0 || first.rows.is_empty() {
            debug!("Listing for shard '{}' is empty", shard);
            return Ok(Vec::new());
        }

        let start = locate_first_page(&self.listing, shard, total_pages).await?;
        let site = self.listing.site();
        let mut first = Some(first).filter(|_| start == 1);
        let mut rows = Vec::new();
        let mut page_number = start;

        loop {
            let page = match first.take() {
                Some(page) => page,
                None => self.listing.fetch_page(shard, page_number).await?,
            };

            rows.extend(
                page.rows
                    .iter()
                    .filter(|row| site.compare_row(row, shard) == ShardOrdering::Within)
                    .cloned(),
            );

            let past_shard = page
                .rows
                .last()
                .map_or(true, |row| site.compare_row(row, shard) == ShardOrdering::After);
            if past_shard || page_number >= total_pages {
                break;
            }
            page_number += 1;
        }

        debug!(
            "Shard '{}' covers pages {}..={} of {}",
            shard, start, page_number, total_pages
        );
        Ok(rows)
    }

    async fn walk_all(&self, shard: &ShardKey) -> Result<Vec<ListingRow>, SweepError> {
        let first = self.listing.fetch_page(shard, 1).await?;
        let total_pages = first.total_pages;
        let mut rows = first.rows;

        for page_number in 2..=total_pages {
            let page = self.listing.fetch_page(shard, page_number).await?;
            if page.rows.is_empty() {
                warn!(
                    "Page {} of {} for shard '{}' is empty",
                    page_number, total_pages, shard
                );
            }
            rows.extend(page.rows);
        }

        debug!("Shard '{}' read from {} pages", shard, total_pages.max(1));
        Ok(rows)
    }

    async fn subdivide(
        &self,
        shard: &ShardKey,
    ) -> Result<(Vec<ListingRow>, Vec<ShardKey>), SweepError> {
        let settings = &self.subdivision;
        let mut pending = vec![(shard.clone(), 0u32)];
        let mut rows = Vec::new();
        let mut exhausted = Vec::new();

        while let Some((term, depth)) = pending.pop() {
            let term_key = CacheKey::Term(term.clone());
            if depth > 0 {
                if let Some(cached) = self.cache.load_or_miss::<ListingRow>(&term_key) {
                    rows.extend(cached);
                    continue;
                }
            }

            let page = self.listing.fetch_page(&term, 1).await?;
            settings.jitter.maybe_pause().await;

            if !page.overflow {
                if depth > 0 {
                    self.cache.store(&term_key, &page.rows)?;
                }
                rows.extend(page.rows);
                continue;
            }

            if depth >= settings.max_depth {
                warn!(
                    "Term '{}' still overflows at depth {}; keeping {} partial rows",
                    term,
                    depth,
                    page.rows.len()
                );
                rows.extend(page.rows);
                exhausted.push(term);
                continue;
            }

            debug!("Term '{}' overflowed; subdividing", term);
            let mut children: Vec<ShardKey> =
                settings.alphabet.iter().map(|&c| term.extend(c)).collect();
            if !term.has_separator() {
                children.extend(
                    settings
                        .alphabet
                        .iter()
                        .map(|&c| term.extend_after_separator(c)),
                );
            }
            // Reversed so the stack pops children in alphabet order
            pending.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }

        Ok((rows, exhausted))
    }
}
