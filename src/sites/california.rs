//! State Bar of California licensee search
//!
//! The quick search matches free text and stops at 500 results, announcing
//! the cut with a fixed notice. Shards are therefore enumerated by
//! subdividing the search term until every query fits under the cap.

use crate::fetcher::Document;
use crate::sites::{
    element_text, encode_term, selector, DetailSite, ListingPage, ListingSite, ListingStrategy,
    ShardOrdering, SiteError,
};
use crate::table::{ListingRow, ShardKey};
use scraper::Html;
use std::collections::BTreeMap;

const DEFAULT_BASE_URL: &str = "https://apps.calbar.ca.gov";
const SEARCH_PATH: &str = "/attorney/LicenseeSearch/QuickSearch";

/// Notice shown when the result list was truncated
pub const OVERFLOW_NOTICE: &str = "Only the first 500 results will be shown.";

/// Licensee statuses that have no useful detail page
const INELIGIBLE_STATUSES: [&str; 2] = ["Judge", "Deceased"];

#[derive(Debug, Clone)]
pub struct CaliforniaSite {
    base_url: String,
}

impl CaliforniaSite {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for CaliforniaSite {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ListingSite for CaliforniaSite {
    fn name(&self) -> &str {
        "california"
    }

    fn strategy(&self) -> ListingStrategy {
        ListingStrategy::Subdivide
    }

    fn listing_url(&self, term: &ShardKey, _page: u32) -> String {
        format!(
            "{}{}?FreeText={}",
            self.base_url,
            SEARCH_PATH,
            encode_term(term)
        )
    }

    fn parse_listing(&self, document: &Document) -> Result<ListingPage, SiteError> {
        let html = Html::parse_document(&document.body);

        let overflow = html
            .select(&selector("strong")?)
            .any(|strong| element_text(strong) == OVERFLOW_NOTICE);

        // No table means no results
        let Some(table) = html.select(&selector("table#tblAttorney")?).next() else {
            return Ok(ListingPage {
                rows: Vec::new(),
                current_page: 1,
                total_pages: 0,
                overflow,
            });
        };

        let header: Vec<String> = table
            .select(&selector("thead th")?)
            .map(element_text)
            .collect();
        if header.is_empty() {
            return Err(SiteError::Malformed(
                "result table has no header".to_string(),
            ));
        }

        let row_selector = selector("tbody tr")?;
        let cell_selector = selector("td")?;
        let anchor_selector = selector("a[href]")?;
        let mut rows = Vec::new();

        for tr in table.select(&row_selector) {
            let mut href = None;
            let mut columns = BTreeMap::new();
            for (column, cell) in header.iter().zip(tr.select(&cell_selector)) {
                if let Some(anchor) = cell.select(&anchor_selector).next() {
                    href = anchor.value().attr("href").map(str::to_string);
                }
                columns.insert(column.clone(), element_text(cell));
            }

            match href {
                Some(identifier) => rows.push(ListingRow {
                    identifier,
                    columns,
                }),
                None => tracing::debug!("Skipping licensee row without a profile link"),
            }
        }

        let total_pages = if rows.is_empty() { 0 } else { 1 };
        Ok(ListingPage {
            rows,
            current_page: 1,
            total_pages,
            overflow,
        })
    }

    fn compare_row(&self, row: &ListingRow, shard: &ShardKey) -> ShardOrdering {
        ShardOrdering::by_prefix(row.get("Name").unwrap_or_default(), shard)
    }
}

impl DetailSite for CaliforniaSite {
    fn is_eligible(&self, row: &ListingRow) -> bool {
        !matches!(row.get("Status"), Some(status) if INELIGIBLE_STATUSES.contains(&status))
    }

    fn detail_url(&self, row: &ListingRow) -> String {
        if row.identifier.starts_with("http") {
            row.identifier.clone()
        } else {
            format!("{}{}", self.base_url, row.identifier)
        }
    }

    fn parse_detail(&self, document: &Document) -> Result<BTreeMap<String, String>, SiteError> {
        let html = Html::parse_document(&document.body);
        let member = html
            .select(&selector("#moduleMemberDetail")?)
            .next()
            .ok_or_else(|| SiteError::MissingElement("#moduleMemberDetail".to_string()))?;

        let mut details = BTreeMap::new();
        for paragraph in member.select(&selector("p")?).map(element_text) {
            if let Some(address) = paragraph.strip_prefix("Address:") {
                details.insert("address".to_string(), address.trim().to_string());
            }
            if let Some(phone) = paragraph.strip_prefix("Phone:") {
                // "Phone: 555-0100 | Fax: 555-0101"
                let phone = phone.split('|').next().unwrap_or_default().trim();
                details.insert("phone".to_string(), phone.to_string());
            }
        }

        if let Some(email) = visible_email(&html)? {
            details.insert("email".to_string(), email);
        }

        if let Some(website) = member.select(&selector("a#websiteLink")?).next() {
            details.insert("website".to_string(), element_text(website));
        }

        Ok(details)
    }
}

/// Finds the real address among the decoy email spans
///
/// The page renders several `<span id="eN">` addresses and an inline style
/// block (`#e0{display:none} #e3{display:inline} ...`) that reveals one.
fn visible_email(html: &Html) -> Result<Option<String>, SiteError> {
    let style = html
        .select(&selector("style")?)
        .map(element_text)
        .find(|text| text.starts_with("#e0"));
    let Some(style) = style else {
        return Ok(None);
    };

    let visible_id = style
        .split('#')
        .filter(|rule| rule.contains("inline"))
        .find_map(|rule| {
            let id = rule.split('{').next()?.trim();
            let digits = id.strip_prefix('e')?;
            (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())).then_some(id)
        });
    let Some(id) = visible_id else {
        return Ok(None);
    };

    let span = html
        .select(&selector(&format!("span#{}", id))?)
        .next()
        .map(element_text);
    Ok(span)
}
