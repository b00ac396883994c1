//! Run statistics
//!
//! A `CrawlReport` is assembled by the orchestrator while the run
//! progresses, logged when the run ends, and printed by the binary.

use std::time::Duration;

/// Crawl run summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Name of the site that was crawled
    pub site: String,

    /// Number of shards enumerated
    pub shards: usize,

    /// Shards served entirely from the cache
    pub shards_from_cache: usize,

    /// Subdivision terms that still overflowed at the depth limit
    pub exhausted_terms: Vec<String>,

    /// Listing rows after merging and deduplication
    pub listing_rows: usize,

    /// Distinct identifiers eligible for a detail fetch
    pub eligible_details: usize,

    /// Detail records in the detail set
    pub detail_records: usize,

    /// The detail set came from the cache
    pub details_from_cache: bool,

    /// Identifiers whose detail page did not parse
    pub parse_failures: Vec<String>,

    /// Rows in the joined table
    pub joined_rows: usize,

    pub elapsed: Duration,
}

impl CrawlReport {
    /// Whether every shard was enumerated without hitting the depth limit
    pub fn is_complete(&self) -> bool {
        self.exhausted_terms.is_empty()
    }

    /// Logs the one-line summary
    pub fn log(&self) {
        tracing::info!(
            "Crawl of {} finished in {:.1}s: {} shards ({} cached), {} listing rows, {} detail records{}",
            self.site,
            self.elapsed.as_secs_f64(),
            self.shards,
            self.shards_from_cache,
            self.listing_rows,
            self.detail_records,
            if self.details_from_cache { " (cached)" } else { "" }
        );
        if !self.is_complete() {
            tracing::warn!(
                "{} subdivision terms were truncated: {}",
                self.exhausted_terms.len(),
                self.exhausted_terms.join(", ")
            );
        }
    }
}

/// Formats a report for the terminal
pub fn format_report(report: &CrawlReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Crawl Report: {} ===\n\n", report.site));

    out.push_str("Listing:\n");
    out.push_str(&format!(
        "  Shards enumerated: {} ({} from cache)\n",
        report.shards, report.shards_from_cache
    ));
    out.push_str(&format!("  Listing rows: {}\n\n", report.listing_rows));

    out.push_str("Details:\n");
    out.push_str(&format!("  Eligible entries: {}\n", report.eligible_details));
    let cached = if report.details_from_cache {
        " (from cache)"
    } else {
        ""
    };
    out.push_str(&format!(
        "  Detail records: {}{}\n",
        report.detail_records, cached
    ));
    out.push_str(&format!(
        "  Unparsed detail pages: {}\n\n",
        report.parse_failures.len()
    ));

    if !report.exhausted_terms.is_empty() {
        out.push_str(&format!(
            "Truncated Terms ({}):\n",
            report.exhausted_terms.len()
        ));
        for term in &report.exhausted_terms {
            out.push_str(&format!("  - {}\n", term));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "Joined rows: {} in {:.1}s\n",
        report.joined_rows,
        report.elapsed.as_secs_f64()
    ));
    out
}

/// Prints a report to stdout
pub fn print_report(report: &CrawlReport) {
    print!("{}", format_report(report));
}
