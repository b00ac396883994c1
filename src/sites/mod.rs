//! Registry site drivers
//!
//! The crawl engine talks to a registry only through the two traits in
//! this module:
//! - `ListingSite`: builds listing URLs, parses listing pages and orders
//!   rows relative to a shard key
//! - `DetailSite`: picks the entries worth a detail fetch, builds their
//!   URLs and parses detail pages
//!
//! Concrete drivers are selected by name at startup through `SiteKind`.

mod california;
mod oregon;
mod washington;

pub use california::{CaliforniaSite, OVERFLOW_NOTICE};
pub use oregon::OregonSite;
pub use washington::WashingtonSite;

use crate::fetcher::Document;
use crate::table::{ListingRow, ShardKey};
use crate::SweepError;
use scraper::{ElementRef, Selector};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while extracting data from a page
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SiteError {
    #[error("Missing element: {0}")]
    MissingElement(String),

    #[error("Malformed page: {0}")]
    Malformed(String),

    #[error("Invalid selector '{0}'")]
    Selector(String),
}

/// Position of a listing row relative to a shard in the listing's sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShardOrdering {
    Before,
    Within,
    After,
}

impl ShardOrdering {
    /// Compares the lowercase prefix of `value` against `shard`
    ///
    /// A value whose prefix equals the key is `Within`; shorter or smaller
    /// prefixes sort `Before`, larger ones `After`.
    pub fn by_prefix(value: &str, shard: &ShardKey) -> Self {
        let prefix: String = value
            .trim()
            .to_lowercase()
            .chars()
            .take(shard.len())
            .collect();
        match prefix.as_str().cmp(shard.as_str()) {
            Ordering::Less => Self::Before,
            Ordering::Equal => Self::Within,
            Ordering::Greater => Self::After,
        }
    }
}

/// How a listing endpoint has to be enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStrategy {
    /// Sorted, paginated results: locate the shard's first page, then walk forward
    PageWalk,

    /// Capped results: split the term until every query is under the cap
    Subdivide,

    /// Results already restricted to the shard: read every page in turn
    WalkAll,
}

/// One parsed listing page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingPage {
    /// Rows in listing order
    pub rows: Vec<ListingRow>,

    pub current_page: u32,

    /// Total page count reported by the listing (0 when there are no results)
    pub total_pages: u32,

    /// The server truncated the results at its cap
    pub overflow: bool,
}

/// Listing half of a registry driver
pub trait ListingSite: Send + Sync {
    fn name(&self) -> &str;

    fn strategy(&self) -> ListingStrategy;

    /// URL of page `page` (1-based) of the listing for `term`
    fn listing_url(&self, term: &ShardKey, page: u32) -> String;

    /// Extracts rows, pagination and the overflow signal from a listing page
    fn parse_listing(&self, document: &Document) -> Result<ListingPage, SiteError>;

    /// Three-way comparison used to locate a shard in a sorted listing
    fn compare_row(&self, row: &ListingRow, shard: &ShardKey) -> ShardOrdering;
}

/// Detail half of a registry driver
pub trait DetailSite: Send + Sync {
    /// Whether `row` should get a detail fetch at all
    fn is_eligible(&self, _row: &ListingRow) -> bool {
        true
    }

    fn detail_url(&self, row: &ListingRow) -> String;

    fn parse_detail(&self, document: &Document) -> Result<BTreeMap<String, String>, SiteError>;
}

/// Registry drivers known to the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
    Oregon,
    California,
    Washington,
}

impl SiteKind {
    pub fn all() -> &'static [SiteKind] {
        &[SiteKind::Oregon, SiteKind::California, SiteKind::Washington]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Oregon => "oregon",
            Self::California => "california",
            Self::Washington => "washington",
        }
    }

    /// Builds both collaborators, optionally against a different host
    pub fn collaborators(
        &self,
        base_url: Option<&str>,
    ) -> (Arc<dyn ListingSite>, Arc<dyn DetailSite>) {
        match self {
            Self::Oregon => {
                let site = Arc::new(base_url.map_or_else(OregonSite::default, OregonSite::new));
                let listing: Arc<dyn ListingSite> = site.clone();
                let details: Arc<dyn DetailSite> = site;
                (listing, details)
            }
            Self::California => {
                let site =
                    Arc::new(base_url.map_or_else(CaliforniaSite::default, CaliforniaSite::new));
                let listing: Arc<dyn ListingSite> = site.clone();
                let details: Arc<dyn DetailSite> = site;
                (listing, details)
            }
            Self::Washington => {
                let site =
                    Arc::new(base_url.map_or_else(WashingtonSite::default, WashingtonSite::new));
                let listing: Arc<dyn ListingSite> = site.clone();
                let details: Arc<dyn DetailSite> = site;
                (listing, details)
            }
        }
    }
}

impl FromStr for SiteKind {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.name() == s.trim().to_lowercase())
            .ok_or_else(|| SweepError::UnknownSite(s.to_string()))
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses a CSS selector, mapping failures into `SiteError`
pub(crate) fn selector(css: &str) -> Result<Selector, SiteError> {
    Selector::parse(css).map_err(|_| SiteError::Selector(css.to_string()))
}

/// Trimmed text content of an element
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Query-string encoding of a search term
pub(crate) fn encode_term(term: &ShardKey) -> String {
    url::form_urlencoded::byte_serialize(term.as_str().as_bytes()).collect()
}
