//! Binary search for the first listing page of a shard
//!
//! A page-walk listing is sorted by the shard attribute, so the pages that
//! hold a shard form one contiguous run. The first page of that run is the
//! lowest page whose rows are not all `Before` the shard.

use crate::crawler::enumerator::Listing;
use crate::sites::{ListingPage, ShardOrdering};
use crate::table::ShardKey;
use crate::SweepError;

/// What one sampled page says about where the shard starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    /// The shard starts on a later page
    Later,

    /// The shard starts on this page
    Here,

    /// The shard starts on this page or an earlier one
    HereOrEarlier,
}

fn classify(first: ShardOrdering, last: ShardOrdering) -> Option<Verdict> {
    use ShardOrdering::*;
    match (first, last) {
        (Before, Before) => Some(Verdict::Later),
        (Before, Within) | (Before, After) => Some(Verdict::Here),
        (Within, Within) | (Within, After) | (After, After) => Some(Verdict::HereOrEarlier),
        (Within, Before) | (After, Before) | (After, Within) => None,
    }
}

/// Locates the first page of `shard` in a listing of `total_pages` pages
///
/// Issues at most `ceil(log2(total_pages)) + 1` page fetches. Contradictory
/// pages (empty, or rows out of order) abort the search with
/// `SweepError::PaginationAmbiguity` rather than being guessed around.
pub async fn locate_first_page(
    listing: &Listing,
    shard: &ShardKey,
    total_pages: u32,
) -> Result<u32, SweepError> {
    let mut start = 1;
    let mut end = total_pages.max(1);

    while start < end {
        let mid = start + (end - start) / 2;
        let page = listing.fetch_page(shard, mid).await?;

        match classify_page(listing, shard, mid, &page)? {
            Verdict::Later => start = mid + 1,
            Verdict::Here => {
                tracing::debug!("Shard '{}' starts on page {}", shard, mid);
                return Ok(mid);
            }
            Verdict::HereOrEarlier => end = mid,
        }
    }

    tracing::debug!("Shard '{}' starts on page {}", shard, start);
    Ok(start)
}

fn classify_page(
    listing: &Listing,
    shard: &ShardKey,
    page_number: u32,
    page: &ListingPage,
) -> Result<Verdict, SweepError> {
    let ambiguity = |reason: &str| SweepError::PaginationAmbiguity {
        shard: shard.to_string(),
        page: page_number,
        reason: reason.to_string(),
    };

    let (Some(first), Some(last)) = (page.rows.first(), page.rows.last()) else {
        return Err(ambiguity("page inside the reported range has no rows"));
    };

    let first = listing.site().compare_row(first, shard);
    let last = listing.site().compare_row(last, shard);
    classify(first, last).ok_or_else(|| {
        ambiguity(&format!(
            "first row is {:?} but last row is {:?} the shard",
            first, last
        ))
    })
}
