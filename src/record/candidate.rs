//! One source's view of one work.

use std::collections::BTreeMap;

use super::Source;
use crate::parser::doi::normalize_doi;
use crate::text::{collapse_whitespace, names};

/// A candidate record produced by a single source.
///
/// All sources produce this one shape so the validator and merge engine never
/// need to know which API a record came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    pub source: Source,
    /// Title as delivered; may still contain markup.
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    /// Normalized (lowercase, prefix-free) DOI.
    pub doi: Option<String>,
    /// Source-specific type label such as `journal-article` or `inproceedings`.
    pub entry_type_hint: Option<String>,
    pub extras: BTreeMap<String, String>,
}

impl RawCandidate {
    #[must_use]
    pub fn new(source: Source) -> Self {
        Self {
            source,
            title: None,
            authors: Vec::new(),
            year: None,
            venue: None,
            doi: None,
            entry_type_hint: None,
            extras: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl AsRef<str>) -> Self {
        self.title = non_empty(title.as_ref());
        self
    }

    #[must_use]
    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.authors = authors
            .into_iter()
            .filter_map(|author| non_empty(author.as_ref()))
            .collect();
        self
    }

    #[must_use]
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    #[must_use]
    pub fn with_venue(mut self, venue: impl AsRef<str>) -> Self {
        self.venue = non_empty(venue.as_ref());
        self
    }

    /// Sets the DOI; values that do not normalize to a valid DOI are dropped.
    #[must_use]
    pub fn with_doi(mut self, doi: impl AsRef<str>) -> Self {
        self.doi = normalize_doi(doi.as_ref());
        self
    }

    #[must_use]
    pub fn with_entry_type_hint(mut self, hint: impl AsRef<str>) -> Self {
        self.entry_type_hint = non_empty(hint.as_ref());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl AsRef<str>) -> Self {
        if let Some(value) = non_empty(value.as_ref()) {
            self.extras.insert(key.into().to_ascii_lowercase(), value);
        }
        self
    }

    #[must_use]
    pub fn has_title(&self) -> bool {
        self.title.is_some()
    }

    /// A candidate with neither title nor DOI cannot be matched to anything.
    #[must_use]
    pub fn has_evidence(&self) -> bool {
        self.title.is_some() || self.doi.is_some()
    }

    /// Display-cased surname of the first author, if any.
    #[must_use]
    pub fn first_author_surname(&self) -> Option<String> {
        self.authors.first().and_then(|name| names::surname(name))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let collapsed = collapse_whitespace(value);
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}
