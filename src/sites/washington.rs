//! Washington State Bar legal directory
//!
//! A first-name search only returns members whose first name starts with
//! the term, twenty to a page, with the total row count in a label above
//! the grid. Shards are enumerated by reading every page of the search.

use crate::fetcher::Document;
use crate::sites::{
    element_text, encode_term, selector, DetailSite, ListingPage, ListingSite, ListingStrategy,
    ShardOrdering, SiteError,
};
use crate::table::{ListingRow, ShardKey};
use scraper::Html;
use std::collections::BTreeMap;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.mywsba.org";
const SEARCH_PATH: &str = "/personifyebusiness/LegalDirectory.aspx";
const PROFILE_PATH: &str = "/personifyebusiness/LegalDirectory/LegalProfile.aspx";

/// Rows per result page
pub const PAGE_SIZE: u32 = 20;

const ROW_COUNT_ID: &str = "dnn_ctr2972_DNNWebControlContainer_ctl00_lblRowCount";
const GRID_ID: &str = "dnn_ctr2972_DNNWebControlContainer_ctl00_dg";
const PROFILE_PANEL_ID: &str = "dnn_ctr2977_DNNWebControlContainer_ctl00_ContainerPanel";
const PROFILE_LABEL_PREFIX: &str = "dnn_ctr2977_DNNWebControlContainer_ctl00_";

/// Grid columns, in table order
const COLUMNS: [&str; 6] = ["bar_num", "first_name", "last_name", "city", "status", "phone"];

/// Profile labels and the fields they populate
const DETAIL_FIELDS: [(&str, &str); 4] = [
    ("lblStatus", "status"),
    ("lblWaAdmitDate", "admit_date"),
    ("lblPhone", "phone"),
    ("lblEmail", "email"),
];

#[derive(Debug, Clone)]
pub struct WashingtonSite {
    base_url: String,
}

impl WashingtonSite {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Profile URL; the directory keys members by a 12-digit padded bar number
    fn profile_url(&self, bar_num: &str) -> String {
        format!("{}{}?Usr_ID={:0>12}", self.base_url, PROFILE_PATH, bar_num)
    }
}

impl Default for WashingtonSite {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ListingSite for WashingtonSite {
    fn name(&self) -> &str {
        "washington"
    }

    fn strategy(&self) -> ListingStrategy {
        ListingStrategy::WalkAll
    }

    fn listing_url(&self, term: &ShardKey, page: u32) -> String {
        format!(
            "{}{}?ShowSearchResults=TRUE&FirstName={}&Page={}",
            self.base_url,
            SEARCH_PATH,
            encode_term(term),
            page
        )
    }

    fn parse_listing(&self, document: &Document) -> Result<ListingPage, SiteError> {
        let html = Html::parse_document(&document.body);

        let total_rows = row_count(&html)?;
        let total_pages = total_rows.div_ceil(PAGE_SIZE);
        let current_page = requested_page(&document.url).unwrap_or(1);

        let grid = html.select(&selector(&format!("table#{}", GRID_ID))?).next();
        let Some(grid) = grid else {
            if total_rows == 0 {
                return Ok(ListingPage {
                    current_page,
                    ..ListingPage::default()
                });
            }
            return Err(SiteError::MissingElement(format!("table#{}", GRID_ID)));
        };

        let row_selector = selector("tr.grid-row")?;
        let cell_selector = selector("td")?;
        let mut rows = Vec::new();
        for tr in grid.select(&row_selector) {
            let cells: Vec<String> = tr.select(&cell_selector).map(element_text).collect();
            if cells.len() < COLUMNS.len() {
                tracing::debug!("Skipping short grid row on {}", document.url);
                continue;
            }
            let mut row = ListingRow::new(self.profile_url(&cells[0]));
            for (column, value) in COLUMNS.iter().zip(cells) {
                row.columns.insert(column.to_string(), value);
            }
            rows.push(row);
        }

        Ok(ListingPage {
            rows,
            current_page,
            total_pages,
            overflow: false,
        })
    }

    fn compare_row(&self, row: &ListingRow, shard: &ShardKey) -> ShardOrdering {
        ShardOrdering::by_prefix(row.get("first_name").unwrap_or_default(), shard)
    }
}

impl DetailSite for WashingtonSite {
    fn detail_url(&self, row: &ListingRow) -> String {
        row.identifier.clone()
    }

    fn parse_detail(&self, document: &Document) -> Result<BTreeMap<String, String>, SiteError> {
        let html = Html::parse_document(&document.body);
        let panel = html
            .select(&selector(&format!("#{}", PROFILE_PANEL_ID))?)
            .next()
            .ok_or_else(|| SiteError::MissingElement(format!("#{}", PROFILE_PANEL_ID)))?;

        let mut details = BTreeMap::new();
        for (label, field) in DETAIL_FIELDS {
            let css = format!("span#{}{}", PROFILE_LABEL_PREFIX, label);
            if let Some(span) = panel.select(&selector(&css)?).next() {
                details.insert(field.to_string(), element_text(span));
            }
        }

        Ok(details)
    }
}

/// Reads the total number of matching members from the row-count label
fn row_count(html: &Html) -> Result<u32, SiteError> {
    let label = html
        .select(&selector(&format!("span#{}", ROW_COUNT_ID))?)
        .next()
        .map(element_text)
        .ok_or_else(|| SiteError::MissingElement(format!("span#{}", ROW_COUNT_ID)))?;

    label
        .split_whitespace()
        .find_map(|word| word.replace(',', "").parse().ok())
        .ok_or_else(|| SiteError::Malformed(format!("no row count in '{}'", label)))
}

fn requested_page(url: &str) -> Option<u32> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(name, _)| name == "Page")
        .and_then(|(_, value)| value.parse().ok())
}
