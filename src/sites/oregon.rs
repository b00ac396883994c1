//! Oregon State Bar member directory
//!
//! The member search is sorted by last name and paginated, so shards are
//! enumerated by locating the first page of a letter and walking forward.

use crate::fetcher::Document;
use crate::sites::{
    element_text, encode_term, selector, DetailSite, ListingPage, ListingSite, ListingStrategy,
    ShardOrdering, SiteError,
};
use crate::table::{ListingRow, ShardKey};
use scraper::Html;
use std::collections::BTreeMap;

const DEFAULT_BASE_URL: &str = "https://www.osbar.org";
const SEARCH_PATH: &str = "/members/membersearch.asp";
const MEMBER_PATH: &str = "/members/membersearch_display.asp";

/// Listing columns, in table order
const COLUMNS: [&str; 3] = ["bar_num", "name", "city"];

/// Detail cell ids and the fields they populate
const DETAIL_FIELDS: [(&str, &str); 4] = [
    ("mstatus", "status"),
    ("madmitdate", "admit_date"),
    ("mphone", "phone"),
    ("memail", "email"),
];

#[derive(Debug, Clone)]
pub struct OregonSite {
    base_url: String,
}

impl OregonSite {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn member_url(&self, bar_num: &str) -> String {
        format!("{}{}?b={}", self.base_url, MEMBER_PATH, bar_num)
    }
}

impl Default for OregonSite {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ListingSite for OregonSite {
    fn name(&self) -> &str {
        "oregon"
    }

    fn strategy(&self) -> ListingStrategy {
        ListingStrategy::PageWalk
    }

    fn listing_url(&self, term: &ShardKey, page: u32) -> String {
        format!(
            "{}{}?last={}&cp={}",
            self.base_url,
            SEARCH_PATH,
            encode_term(term),
            page
        )
    }

    fn parse_listing(&self, document: &Document) -> Result<ListingPage, SiteError> {
        let html = Html::parse_document(&document.body);

        let table = html
            .select(&selector("table#tblResults")?)
            .next()
            .ok_or_else(|| SiteError::MissingElement("table#tblResults".to_string()))?;

        let row_selector = selector("tbody tr")?;
        let cell_selector = selector("td")?;
        let mut rows = Vec::new();
        for tr in table.select(&row_selector) {
            let cells: Vec<String> = tr.select(&cell_selector).map(element_text).collect();
            if cells.len() < COLUMNS.len() {
                continue;
            }
            let mut row = ListingRow::new(self.member_url(&cells[0]));
            for (column, value) in COLUMNS.iter().zip(cells) {
                row.columns.insert(column.to_string(), value);
            }
            rows.push(row);
        }

        let (current_page, total_pages) = match page_position(&html)? {
            Some(position) => position,
            None if rows.is_empty() => (1, 0),
            None => (1, 1),
        };

        Ok(ListingPage {
            rows,
            current_page,
            total_pages,
            overflow: false,
        })
    }

    fn compare_row(&self, row: &ListingRow, shard: &ShardKey) -> ShardOrdering {
        ShardOrdering::by_prefix(row.get("name").unwrap_or_default(), shard)
    }
}

impl DetailSite for OregonSite {
    fn detail_url(&self, row: &ListingRow) -> String {
        row.identifier.clone()
    }

    fn parse_detail(&self, document: &Document) -> Result<BTreeMap<String, String>, SiteError> {
        let html = Html::parse_document(&document.body);
        let table = html
            .select(&selector("table#tbl_member")?)
            .next()
            .ok_or_else(|| SiteError::MissingElement("table#tbl_member".to_string()))?;

        let row_selector = selector("tr")?;
        let cell_selector = selector("td")?;
        let mut details = BTreeMap::new();

        for tr in table.select(&row_selector) {
            let cells: Vec<_> = tr.select(&cell_selector).collect();
            if cells.len() < 2 {
                continue;
            }
            let value = element_text(cells[1]);

            match cells[1].value().attr("id") {
                Some(id) => {
                    if let Some((_, field)) = DETAIL_FIELDS.iter().find(|(cell, _)| *cell == id) {
                        details.insert(field.to_string(), value);
                    } else if id != "mnum" {
                        tracing::debug!("Skipping unknown member cell '{}' on {}", id, document.url);
                    }
                }
                None => {
                    let label = element_text(cells[0]);
                    let label = label.trim_end_matches(':').trim();
                    if !label.is_empty() {
                        details.insert(label.to_string(), value);
                    }
                }
            }
        }

        Ok(details)
    }
}

/// Reads "Page X of Y" from the paging header
fn page_position(html: &Html) -> Result<Option<(u32, u32)>, SiteError> {
    let header_selector = selector(".pagingheader h3")?;
    for header in html.select(&header_selector) {
        let text = element_text(header);
        let words: Vec<&str> = text.split_whitespace().collect();
        if let ["Page", current, "of", total] = words.as_slice() {
            let current = current
                .parse()
                .map_err(|_| SiteError::Malformed(format!("bad page number in '{}'", text)))?;
            let total = total
                .parse()
                .map_err(|_| SiteError::Malformed(format!("bad page count in '{}'", text)))?;
            return Ok(Some((current, total)));
        }
    }
    Ok(None)
}
