use crate::table::{DetailRecord, ListingRow};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One listing row with its detail fields attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRow {
    pub identifier: String,
    pub listing: BTreeMap<String, String>,

    /// `None` when no detail was fetched for this identifier
    pub detail: Option<BTreeMap<String, String>>,
}

impl JoinedRow {
    /// Detail value, or `None` when the field or the whole detail is absent
    pub fn detail_field(&self, field: &str) -> Option<&str> {
        self.detail
            .as_ref()
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }
}

/// The final result of a crawl: one row per listing entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinedTable {
    /// Union of listing column names, sorted
    pub listing_columns: Vec<String>,

    /// Union of detail field names, sorted
    pub detail_columns: Vec<String>,

    pub rows: Vec<JoinedRow>,
}

impl JoinedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Left join of listing rows with detail records on `identifier`
///
/// Every listing row appears exactly once and in listing order. Detail
/// records for identifiers not in the listing are ignored; if a detail
/// identifier repeats, the first record wins.
pub fn join(listing: &[ListingRow], details: &[DetailRecord]) -> JoinedTable {
    let mut by_identifier: HashMap<&str, &DetailRecord> = HashMap::with_capacity(details.len());
    for record in details {
        by_identifier
            .entry(record.identifier.as_str())
            .or_insert(record);
    }

    let mut listing_columns = BTreeSet::new();
    let mut detail_columns = BTreeSet::new();

    let rows = listing
        .iter()
        .map(|row| {
            listing_columns.extend(row.columns.keys().cloned());
            let detail = by_identifier.get(row.identifier.as_str()).map(|record| {
                detail_columns.extend(record.fields.keys().cloned());
                record.fields.clone()
            });
            JoinedRow {
                identifier: row.identifier.clone(),
                listing: row.columns.clone(),
                detail,
            }
        })
        .collect();

    JoinedTable {
        listing_columns: listing_columns.into_iter().collect(),
        detail_columns: detail_columns.into_iter().collect(),
        rows,
    }
}
