//! Detail phase: one fetch per eligible listing entry
//!
//! The whole detail set is cached under the content hash of the listing it
//! was built from. An unchanged listing therefore costs no detail fetches at
//! all, and any change to it invalidates the set.

use crate::cache::{CacheKey, ShardCache};
use crate::config::Concurrency;
use crate::crawler::pool::run_pool;
use crate::fetcher::RetryingFetcher;
use crate::sites::DetailSite;
use crate::table::{dedup_first_seen, ContentHash, DetailRecord, ListingRow};
use crate::SweepError;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of the detail phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailSet {
    pub hash: ContentHash,

    /// One record per eligible identifier, in listing order
    pub records: Vec<DetailRecord>,

    pub from_cache: bool,

    /// Identifiers whose detail page fetched fine but did not parse
    pub parse_failures: Vec<String>,
}

/// What happened to one detail unit
enum DetailOutcome {
    Parsed(DetailRecord),
    Unparsed(DetailRecord),
    Failed {
        identifier: String,
        error: SweepError,
    },
}

/// Fetches and parses the detail page of every eligible entry
pub struct DetailFetcher {
    site: Arc<dyn DetailSite>,
    fetcher: RetryingFetcher,
    cache: ShardCache,
    concurrency: Concurrency,
}

impl DetailFetcher {
    pub fn new(
        site: Arc<dyn DetailSite>,
        fetcher: RetryingFetcher,
        cache: ShardCache,
        concurrency: Concurrency,
    ) -> Self {
        Self {
            site,
            fetcher,
            cache,
            concurrency,
        }
    }

    /// Number of distinct identifiers in `listing` that get a detail fetch
    pub fn eligible_count(&self, listing: &[ListingRow]) -> usize {
        self.eligible(listing).len()
    }

    fn eligible(&self, listing: &[ListingRow]) -> Vec<ListingRow> {
        dedup_first_seen(
            listing
                .iter()
                .filter(|row| self.site.is_eligible(row))
                .cloned(),
        )
    }

    /// Returns the detail set for `listing`, fetching only on a cache miss
    ///
    /// Every unit runs to completion before a failure is reported. The error
    /// names the failed identifier that comes first in the listing.
    pub async fn fetch_details(&self, listing: &[ListingRow]) -> Result<DetailSet, SweepError> {
        let hash = ContentHash::of_listing(listing);
        let key = CacheKey::Details(hash.clone());

        if let Some(records) = self.cache.load_or_miss::<DetailRecord>(&key) {
            info!("Detail set {} served from cache ({} records)", hash, records.len());
            return Ok(DetailSet {
                hash,
                records,
                from_cache: true,
                parse_failures: Vec::new(),
            });
        }

        let targets = self.eligible(listing);
        info!(
            "Fetching {} detail pages ({} listing rows)",
            targets.len(),
            listing.len()
        );

        let work: Vec<(usize, ListingRow)> = targets.into_iter().enumerate().collect();
        let site = Arc::clone(&self.site);
        let fetcher = self.fetcher.clone();
        let mut outcomes = run_pool(self.concurrency, work, move |(index, row)| {
            let site = Arc::clone(&site);
            let fetcher = fetcher.clone();
            async move { (index, fetch_one(site.as_ref(), &fetcher, row).await) }
        })
        .await?;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut records = Vec::with_capacity(outcomes.len());
        let mut parse_failures = Vec::new();
        let mut failures = Vec::new();
        for (_, outcome) in outcomes {
            match outcome {
                DetailOutcome::Parsed(record) => records.push(record),
                DetailOutcome::Unparsed(record) => {
                    parse_failures.push(record.identifier.clone());
                    records.push(record);
                }
                DetailOutcome::Failed { identifier, error } => failures.push((identifier, error)),
            }
        }

        if !failures.is_empty() {
            for (identifier, e) in &failures {
                error!("Detail fetch for '{}' failed: {}", identifier, e);
            }
            error!("{} detail fetches failed; detail set not cached", failures.len());
            if let Some((identifier, source)) = failures.into_iter().next() {
                return Err(SweepError::Detail {
                    identifier,
                    source: Box::new(source),
                });
            }
        }

        self.cache.store(&key, &records)?;
        info!(
            "Detail set {} stored ({} records, {} unparsed)",
            hash,
            records.len(),
            parse_failures.len()
        );

        Ok(DetailSet {
            hash,
            records,
            from_cache: false,
            parse_failures,
        })
    }
}

async fn fetch_one(
    site: &dyn DetailSite,
    fetcher: &RetryingFetcher,
    row: ListingRow,
) -> DetailOutcome {
    let url = site.detail_url(&row);
    debug!("Fetching detail page {}", url);

    let document = match fetcher.fetch(&url).await {
        Ok(document) => document,
        Err(e) => {
            return DetailOutcome::Failed {
                identifier: row.identifier,
                error: e.into(),
            }
        }
    };

    match site.parse_detail(&document) {
        Ok(fields) => DetailOutcome::Parsed(DetailRecord::with_fields(row.identifier, fields)),
        Err(e) => {
            warn!("Could not parse detail page for '{}': {}", row.identifier, e);
            DetailOutcome::Unparsed(DetailRecord::new(row.identifier))
        }
    }
}
