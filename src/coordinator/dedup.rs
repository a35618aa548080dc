//! Combining discovery listings into one list of distinct works.

use std::cmp::Reverse;

use tracing::trace;

use crate::matching::{SimilarityScorer, WorkIdentity};
use crate::record::RawCandidate;
use crate::text::normalize_title;

/// Sort key shared by listings and the final work order.
fn listing_key(work: &RawCandidate) -> (Reverse<i32>, String, String) {
    (
        Reverse(work.year.unwrap_or(i32::MIN)),
        work.title.as_deref().map(normalize_title).unwrap_or_default(),
        work.first_author_surname().unwrap_or_default().to_lowercase(),
    )
}

/// Copies every field `target` lacks from `other`.
pub fn fill_missing(target: &mut RawCandidate, other: &RawCandidate) {
    if target.title.is_none() {
        target.title.clone_from(&other.title);
    }
    if target.authors.is_empty() {
        target.authors.clone_from(&other.authors);
    }
    if target.year.is_none() {
        target.year = other.year;
    }
    if target.venue.is_none() {
        target.venue.clone_from(&other.venue);
    }
    if target.doi.is_none() {
        target.doi.clone_from(&other.doi);
    }
    if target.entry_type_hint.is_none() {
        target.entry_type_hint.clone_from(&other.entry_type_hint);
    }
    for (key, value) in &other.extras {
        target
            .extras
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

/// Merges listings, the first (primary) listing first. A work that duplicates
/// one already kept only fills that work's empty fields.
#[must_use]
pub fn merge_listings(
    listings: Vec<Vec<RawCandidate>>,
    scorer: &SimilarityScorer,
) -> Vec<RawCandidate> {
    let mut kept: Vec<(WorkIdentity, RawCandidate)> = Vec::new();
    for mut listing in listings {
        listing.sort_by_cached_key(listing_key);
        for work in listing {
            let identity = WorkIdentity::from_candidate(&work);
            let duplicate = kept
                .iter()
                .position(|(existing, _)| scorer.is_duplicate(existing, &identity));
            match duplicate {
                Some(index) => {
                    trace!(title = work.title.as_deref().unwrap_or(""), "duplicate listing entry");
                    let (identity, existing) = &mut kept[index];
                    fill_missing(existing, &work);
                    *identity = WorkIdentity::from_candidate(existing);
                }
                None => kept.push((identity, work)),
            }
        }
    }
    kept.into_iter().map(|(_, work)| work).collect()
}

/// Works inside the contribution window plus counts of what was left out.
#[derive(Debug, Default)]
pub struct WindowSplit {
    pub kept: Vec<RawCandidate>,
    pub yearless: usize,
    pub outside: usize,
}

/// Keeps works published in `min_year` or later. Works without a year are
/// excluded and counted.
#[must_use]
pub fn within_window(works: Vec<RawCandidate>, min_year: i32) -> WindowSplit {
    let mut split = WindowSplit::default();
    for work in works {
        match work.year {
            Some(year) if year >= min_year => split.kept.push(work),
            Some(_) => split.outside += 1,
            None => split.yearless += 1,
        }
    }
    split
}

/// Current-year works first, then newest first, then title and first author.
pub fn order_works(works: &mut [RawCandidate], current_year: i32) {
    works.sort_by_cached_key(|work| (work.year != Some(current_year), listing_key(work)));
}
