//! Delimited-text export of the joined table

use crate::output::OutputResult;
use crate::table::JoinedTable;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Suffix appended to a detail column that shares its name with a listing column
const DETAIL_SUFFIX: &str = "_detail";

const IDENTIFIER_COLUMN: &str = "identifier";

/// Writes `table` to `path`, one line per row, header first
pub fn write_delimited(table: &JoinedTable, path: &Path, delimiter: char) -> OutputResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(format_delimited(table, delimiter).as_bytes())?;
    writer.flush()?;

    tracing::info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Renders `table` as delimited text
///
/// Columns are `identifier`, the listing columns, then the detail columns.
/// A missing value (no detail record, or a field the record lacks) is an
/// empty cell.
pub fn format_delimited(table: &JoinedTable, delimiter: char) -> String {
    let mut out = String::new();
    let sep = delimiter.to_string();

    let header: Vec<Cow<'_, str>> = header_names(table)
        .into_iter()
        .map(|name| escape(name, delimiter))
        .collect();
    out.push_str(&header.join(&sep));
    out.push('\n');

    for row in &table.rows {
        let fields: Vec<Cow<'_, str>> = std::iter::once(row.identifier.as_str())
            .chain(
                table
                    .listing_columns
                    .iter()
                    .map(|c| row.listing.get(c).map_or("", String::as_str)),
            )
            .chain(
                table
                    .detail_columns
                    .iter()
                    .map(|c| row.detail_field(c).unwrap_or("")),
            )
            .map(|value| escape(Cow::Borrowed(value), delimiter))
            .collect();
        out.push_str(&fields.join(&sep));
        out.push('\n');
    }

    out
}

/// Column names for the header row, each one distinct
///
/// A detail column named like a listing column (or `identifier`) gets the
/// `_detail` suffix, and a numbered suffix if that name is taken as well.
fn header_names(table: &JoinedTable) -> Vec<Cow<'_, str>> {
    let taken: HashSet<&str> = std::iter::once(IDENTIFIER_COLUMN)
        .chain(table.listing_columns.iter().map(String::as_str))
        .chain(table.detail_columns.iter().map(String::as_str))
        .collect();
    let mut renamed: HashSet<String> = HashSet::new();

    let mut names: Vec<Cow<'_, str>> = std::iter::once(Cow::Borrowed(IDENTIFIER_COLUMN))
        .chain(table.listing_columns.iter().map(|c| Cow::Borrowed(c.as_str())))
        .collect();

    for column in &table.detail_columns {
        if column != IDENTIFIER_COLUMN && !table.listing_columns.contains(column) {
            names.push(Cow::Borrowed(column.as_str()));
            continue;
        }

        let base = format!("{}{}", column, DETAIL_SUFFIX);
        let mut candidate = base.clone();
        let mut n = 2;
        while taken.contains(candidate.as_str()) || renamed.contains(&candidate) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        renamed.insert(candidate.clone());
        names.push(Cow::Owned(candidate));
    }

    names
}

/// Quotes a field containing the delimiter, a quote or a line break
fn escape(field: Cow<'_, str>, delimiter: char) -> Cow<'_, str> {
    if field.contains(|c: char| c == delimiter || c == '"' || c == '\n' || c == '\r') {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        field
    }
}
