//! Output module for crawl results and reports
//!
//! This module handles:
//! - Exporting the joined table as delimited text
//! - Summarizing a run in a `CrawlReport`

mod delimited;
pub mod stats;

pub use delimited::{format_delimited, write_delimited};
pub use stats::{format_report, print_report, CrawlReport};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid delimiter '{0}'")]
    Delimiter(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Parses a configured delimiter string into its single character
pub fn parse_delimiter(delimiter: &str) -> OutputResult<char> {
    let mut chars = delimiter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(OutputError::Delimiter(delimiter.to_string())),
    }
}
