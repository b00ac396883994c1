//! Synthetic registries for exercising the crawl engine in unit tests
//!
//! Both registries serve a tiny line format through `ScriptedTransport`:
//! a header line followed by one `identifier|name` line per row.

use crate::fetcher::scripted::ScriptedTransport;
use crate::fetcher::{Document, TransportError};
use crate::sites::{
    DetailSite, ListingPage, ListingSite, ListingStrategy, ShardOrdering, SiteError,
};
use crate::table::{ListingRow, ShardKey, TERM_SEPARATOR};
use std::collections::BTreeMap;
use std::sync::Arc;

fn parse_rows<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Vec<ListingRow>, SiteError> {
    lines
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (identifier, name) = line
                .split_once('|')
                .ok_or_else(|| SiteError::Malformed(format!("bad row '{}'", line)))?;
            Ok(ListingRow::new(identifier).with("name", name))
        })
        .collect()
}

fn render_rows<'a>(names: impl Iterator<Item = &'a String>) -> String {
    names
        .map(|name| format!("\nid-{}|{}", name.replace(' ', "_"), name))
        .collect()
}

/// Sorted listing split into fixed-size pages
///
/// By default every term sees the whole listing. A per-term registry only
/// serves the names starting with the requested term.
pub struct PagedRegistry {
    pub names: Vec<String>,
    pub page_size: usize,
    pub per_term: bool,
}

impl PagedRegistry {
    pub fn new(mut names: Vec<String>, page_size: usize) -> Self {
        names.sort();
        Self {
            names,
            page_size,
            per_term: false,
        }
    }

    pub fn per_term(names: Vec<String>, page_size: usize) -> Self {
        Self {
            per_term: true,
            ..Self::new(names, page_size)
        }
    }

    pub fn total_pages(&self) -> u32 {
        self.names.len().div_ceil(self.page_size) as u32
    }

    /// Transport serving this registry's pages
    pub fn transport(self: &Arc<Self>) -> Arc<ScriptedTransport> {
        let registry = Arc::clone(self);
        Arc::new(ScriptedTransport::new(move |url, _| registry.serve(url)))
    }

    pub fn serve(&self, url: &str) -> Result<String, TransportError> {
        let (term, page) = url
            .strip_prefix("mem://list/")
            .and_then(|rest| rest.rsplit_once('/'))
            .and_then(|(term, page)| Some((term, page.parse::<u32>().ok()?)))
            .ok_or_else(|| TransportError::Other(format!("bad url {}", url)))?;

        let names: Vec<&String> = self
            .names
            .iter()
            .filter(|name| !self.per_term || name.starts_with(term))
            .collect();
        let total_pages = names.len().div_ceil(self.page_size);
        let start = (page.saturating_sub(1) as usize) * self.page_size;
        let rows = names.into_iter().skip(start).take(self.page_size);
        Ok(format!("page {} of {}{}", page, total_pages, render_rows(rows)))
    }
}

impl ListingSite for PagedRegistry {
    fn name(&self) -> &str {
        "paged"
    }

    fn strategy(&self) -> ListingStrategy {
        if self.per_term {
            ListingStrategy::WalkAll
        } else {
            ListingStrategy::PageWalk
        }
    }

    fn listing_url(&self, term: &ShardKey, page: u32) -> String {
        format!("mem://list/{}/{}", term, page)
    }

    fn parse_listing(&self, document: &Document) -> Result<ListingPage, SiteError> {
        let mut lines = document.body.lines();
        let header = lines.next().unwrap_or_default();
        let numbers: Vec<u32> = header
            .split_whitespace()
            .filter_map(|word| word.parse().ok())
            .collect();
        let [current_page, total_pages] = numbers[..] else {
            return Err(SiteError::Malformed(format!("bad header '{}'", header)));
        };
        Ok(ListingPage {
            rows: parse_rows(lines)?,
            current_page,
            total_pages,
            overflow: false,
        })
    }

    fn compare_row(&self, row: &ListingRow, shard: &ShardKey) -> ShardOrdering {
        ShardOrdering::by_prefix(row.get("name").unwrap_or_default(), shard)
    }
}

/// Free-text search that reports overflow for terms shallower than `depth`
pub struct CappedRegistry {
    pub names: Vec<String>,
    pub root_len: usize,
    pub depth: usize,
}

impl CappedRegistry {
    pub fn new(names: Vec<String>, depth: usize) -> Self {
        Self {
            names,
            root_len: 1,
            depth,
        }
    }

    pub fn transport(self: &Arc<Self>) -> Arc<ScriptedTransport> {
        let registry = Arc::clone(self);
        Arc::new(ScriptedTransport::new(move |url, _| registry.serve(url)))
    }

    /// Names the full result set for `term` would contain
    pub fn matching(&self, term: &str) -> Vec<String> {
        self.names
            .iter()
            .filter(|name| name.starts_with(term))
            .cloned()
            .collect()
    }

    pub fn serve(&self, url: &str) -> Result<String, TransportError> {
        let term = url
            .strip_prefix("mem://search/")
            .ok_or_else(|| TransportError::Other(format!("bad url {}", url)))?
            .replace('+', " ");
        let term_depth = term.chars().filter(|c| *c != TERM_SEPARATOR).count() - self.root_len;
        let matches = self.matching(&term);

        if term_depth < self.depth {
            Ok(format!("overflow{}", render_rows(matches.iter().take(3))))
        } else {
            Ok(format!("complete{}", render_rows(matches.iter())))
        }
    }
}

impl ListingSite for CappedRegistry {
    fn name(&self) -> &str {
        "capped"
    }

    fn strategy(&self) -> ListingStrategy {
        ListingStrategy::Subdivide
    }

    fn listing_url(&self, term: &ShardKey, _page: u32) -> String {
        format!("mem://search/{}", term.as_str().replace(' ', "+"))
    }

    fn parse_listing(&self, document: &Document) -> Result<ListingPage, SiteError> {
        let mut lines = document.body.lines();
        let overflow = match lines.next() {
            Some("overflow") => true,
            Some("complete") => false,
            other => {
                return Err(SiteError::Malformed(format!("bad header {:?}", other)));
            }
        };
        let rows = parse_rows(lines)?;
        Ok(ListingPage {
            total_pages: if rows.is_empty() { 0 } else { 1 },
            rows,
            current_page: 1,
            overflow,
        })
    }

    fn compare_row(&self, row: &ListingRow, shard: &ShardKey) -> ShardOrdering {
        ShardOrdering::by_prefix(row.get("name").unwrap_or_default(), shard)
    }
}

/// Detail pages answering `detail:<identifier>` with one field per line
pub struct EchoDetails;

impl EchoDetails {
    pub fn url_for(identifier: &str) -> String {
        format!("mem://detail/{}", identifier)
    }
}

impl DetailSite for EchoDetails {
    fn is_eligible(&self, row: &ListingRow) -> bool {
        row.get("status") != Some("Deceased")
    }

    fn detail_url(&self, row: &ListingRow) -> String {
        Self::url_for(&row.identifier)
    }

    fn parse_detail(&self, document: &Document) -> Result<BTreeMap<String, String>, SiteError> {
        document
            .body
            .lines()
            .map(|line| {
                line.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| SiteError::Malformed(format!("bad field '{}'", line)))
            })
            .collect()
    }
}
