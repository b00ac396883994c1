//! Crawl orchestration
//!
//! A crawl runs in two phases:
//! 1. Listing: every shard is enumerated by a bounded worker pool and the
//!    results are merged in configured key order with first-seen dedup
//! 2. Details: the merged listing is hashed and its detail set is fetched
//!    (or read back from the cache), then joined onto the listing
//!
//! A failing shard does not stop the other shards; their results reach
//! the cache before the run reports the failure.

use crate::cache::ShardCache;
use crate::config::{Concurrency, Config};
use crate::crawler::details::DetailFetcher;
use crate::crawler::enumerator::{
    Jitter, ListEnumerator, Listing, ShardListing, SubdivisionSettings,
};
use crate::crawler::pool::run_pool;
use crate::fetcher::{HttpTransport, RetryPolicy, RetryingFetcher, Transport};
use crate::output::CrawlReport;
use crate::sites::{DetailSite, ListingSite, SiteKind};
use crate::table::{dedup_first_seen, join, JoinedTable, ListingRow, ShardKey};
use crate::SweepError;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Tuning shared by both phases
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub concurrency: Concurrency,
    pub retry: RetryPolicy,
    pub subdivision: SubdivisionSettings,
}

impl CrawlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.crawler.concurrency,
            retry: RetryPolicy::from_config(&config.retry),
            subdivision: SubdivisionSettings {
                alphabet: config.shards.extension_alphabet.chars().collect(),
                max_depth: config.crawler.max_subdivision_depth,
                jitter: Jitter {
                    probability: config.crawler.jitter_probability,
                    pause: Duration::from_millis(config.crawler.jitter_ms),
                },
            },
        }
    }
}

/// Runs the listing and detail phases of one crawl
pub struct CrawlOrchestrator {
    site_name: String,
    enumerator: Arc<ListEnumerator>,
    details: DetailFetcher,
    cache: ShardCache,
    concurrency: Concurrency,
}

impl CrawlOrchestrator {
    pub fn new(
        listing_site: Arc<dyn ListingSite>,
        detail_site: Arc<dyn DetailSite>,
        transport: Arc<dyn Transport>,
        cache: ShardCache,
        options: CrawlOptions,
    ) -> Self {
        let fetcher = RetryingFetcher::new(transport, options.retry);
        let site_name = listing_site.name().to_string();
        let enumerator = ListEnumerator::new(
            Listing::new(listing_site, fetcher.clone()),
            cache.clone(),
            options.subdivision,
        );
        let details = DetailFetcher::new(detail_site, fetcher, cache.clone(), options.concurrency);

        Self {
            site_name,
            enumerator: Arc::new(enumerator),
            details,
            cache,
            concurrency: options.concurrency,
        }
    }

    /// Builds an orchestrator for the configured site over real HTTP
    ///
    /// The cache lives in a subdirectory of the configured root named after
    /// the site.
    pub fn from_config(config: &Config) -> Result<Self, SweepError> {
        let kind: SiteKind = config.site.parse()?;
        let (listing_site, detail_site) = kind.collaborators(config.base_url.as_deref());
        let transport = Arc::new(HttpTransport::from_config(&config.user_agent)?);
        let cache = ShardCache::new(Path::new(&config.cache.root).join(kind.name()));

        Ok(Self::new(
            listing_site,
            detail_site,
            transport,
            cache,
            CrawlOptions::from_config(config),
        ))
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    pub fn cache(&self) -> &ShardCache {
        &self.cache
    }

    /// Enumerates every shard and merges the rows in `shards` order
    ///
    /// All shards run to completion. If any failed, the first failure in
    /// key order is returned as `SweepError::Shard`.
    pub async fn enumerate_shards(
        &self,
        shards: &[ShardKey],
    ) -> Result<(Vec<ListingRow>, Vec<ShardListing>), SweepError> {
        let work: Vec<(usize, ShardKey)> = shards.iter().cloned().enumerate().collect();
        let enumerator = Arc::clone(&self.enumerator);

        let mut outcomes = run_pool(self.concurrency, work, move |(index, shard)| {
            let enumerator = Arc::clone(&enumerator);
            async move {
                let result = enumerator.enumerate(&shard).await;
                (index, shard, result)
            }
        })
        .await?;
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut listings = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (_, shard, result) in outcomes {
            match result {
                Ok(listing) => listings.push(listing),
                Err(e) => {
                    error!("Shard '{}' failed: {}", shard, e);
                    failures.push((shard, e));
                }
            }
        }

        if let Some((shard, source)) = failures.into_iter().next() {
            return Err(SweepError::Shard {
                shard: shard.to_string(),
                source: Box::new(source),
            });
        }

        let rows = dedup_first_seen(
            listings
                .iter()
                .flat_map(|listing| listing.rows.iter().cloned()),
        );
        Ok((rows, listings))
    }

    /// Runs a full crawl over `shards`
    pub async fn crawl(
        &self,
        shards: &[ShardKey],
    ) -> Result<(JoinedTable, CrawlReport), SweepError> {
        let started = Instant::now();
        info!(
            "Crawling {} shards of {} (cache {})",
            shards.len(),
            self.site_name,
            self.cache.root().display()
        );

        let (listing, shard_listings) = self.enumerate_shards(shards).await?;
        info!(
            "Listing phase complete: {} rows from {} shards",
            listing.len(),
            shard_listings.len()
        );

        let eligible_details = self.details.eligible_count(&listing);
        let detail_set = self.details.fetch_details(&listing).await?;
        let table = join(&listing, &detail_set.records);

        let report = CrawlReport {
            site: self.site_name.clone(),
            shards: shard_listings.len(),
            shards_from_cache: shard_listings.iter().filter(|l| l.from_cache).count(),
            exhausted_terms: shard_listings
                .iter()
                .flat_map(|l| l.exhausted_terms.iter().map(ShardKey::to_string))
                .collect(),
            listing_rows: listing.len(),
            eligible_details,
            detail_records: detail_set.records.len(),
            details_from_cache: detail_set.from_cache,
            parse_failures: detail_set.parse_failures,
            joined_rows: table.len(),
            elapsed: started.elapsed(),
        };
        report.log();

        Ok((table, report))
    }
}
