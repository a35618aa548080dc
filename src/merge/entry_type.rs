//! Venue keyword classification for entry types.

use crate::record::EntryType;
use crate::text::fold_diacritics;

const PREPRINT_KEYWORDS: [&str; 8] = [
    "arxiv",
    "biorxiv",
    "medrxiv",
    "chemrxiv",
    "preprint",
    "ssrn",
    "research square",
    "openreview",
];

const DATASET_KEYWORDS: [&str; 6] = [
    "dataset",
    "data set",
    "zenodo",
    "figshare",
    "dryad",
    "data repository",
];

const CONFERENCE_KEYWORDS: [&str; 13] = [
    "proceedings",
    "conference",
    "symposium",
    "workshop",
    "meeting",
    "summit",
    "congress",
    "colloquium",
    "chapter of the association",
    "findings of",
    "lecture notes in computer science",
    "advances in neural information processing",
    "annual meeting",
];

const BOOK_KEYWORDS: [&str; 8] = [
    "handbook",
    "chapter",
    "encyclopedia",
    "lecture notes",
    "book series",
    "studies in",
    "advances in",
    "in: ",
];

const JOURNAL_KEYWORDS: [&str; 9] = [
    "journal",
    "transactions",
    "letters",
    "review",
    "annals",
    "bulletin",
    "magazine",
    "quarterly",
    "acta",
];

/// Classifies venue text; `None` when no keyword set matches.
///
/// Sets are checked most specific first, so "Proceedings of ... Workshop" is a
/// conference and "arXiv preprint" a preprint even though other words match later sets.
#[must_use]
pub fn classify_venue(venue: &str) -> Option<EntryType> {
    let lowered = fold_diacritics(venue).to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|keyword| lowered.contains(keyword));

    if has(&PREPRINT_KEYWORDS) {
        Some(EntryType::Preprint)
    } else if has(&DATASET_KEYWORDS) {
        Some(EntryType::Dataset)
    } else if has(&CONFERENCE_KEYWORDS) {
        Some(EntryType::Conference)
    } else if has(&BOOK_KEYWORDS) {
        Some(EntryType::BookChapter)
    } else if has(&JOURNAL_KEYWORDS) {
        Some(EntryType::Journal)
    } else {
        None
    }
}
