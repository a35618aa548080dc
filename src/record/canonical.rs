//! The merged, provenance-tagged output record.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Source;

/// A value together with the source that supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sourced<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Sourced<T> {
    pub fn new(value: T, source: Source) -> Self {
        Self { value, source }
    }
}

/// Publication kind inferred during merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Journal,
    Conference,
    BookChapter,
    Preprint,
    Dataset,
    Unknown,
}

impl EntryType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Journal => "journal",
            Self::Conference => "conference",
            Self::BookChapter => "book_chapter",
            Self::Preprint => "preprint",
            Self::Dataset => "dataset",
            Self::Unknown => "unknown",
        }
    }

    /// BibTeX entry type used when serializing.
    #[must_use]
    pub fn bibtex_type(self) -> &'static str {
        match self {
            Self::Journal => "article",
            Self::Conference => "inproceedings",
            Self::BookChapter => "incollection",
            Self::Preprint | Self::Dataset | Self::Unknown => "misc",
        }
    }

    /// Maps a source's type label (Crossref, CSL, BibTeX, OpenAlex...) to an entry type.
    #[must_use]
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.trim().to_ascii_lowercase();
        let kind = match hint.as_str() {
            "journal-article" | "article-journal" | "article" | "journal" | "journalarticle"
            | "review" => Self::Journal,
            "proceedings-article" | "paper-conference" | "inproceedings" | "conference"
            | "conference-paper" | "proceedings" => Self::Conference,
            "book-chapter" | "chapter" | "incollection" | "inbook" | "book-section" => {
                Self::BookChapter
            }
            "posted-content" | "preprint" | "article-preprint" | "unpublished" => Self::Preprint,
            "dataset" | "data-set" => Self::Dataset,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output field named in provenance maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    Authors,
    Year,
    Venue,
    EntryType,
    Doi,
    Extra(String),
}

impl Field {
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Title => FieldKind::Title,
            Self::Authors => FieldKind::Authors,
            Self::Year => FieldKind::Year,
            Self::Venue => FieldKind::Venue,
            Self::EntryType => FieldKind::EntryType,
            Self::Doi => FieldKind::Doi,
            Self::Extra(_) => FieldKind::Extras,
        }
    }
}

/// Field categories, used to choose which fields count toward `trust_hits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Title,
    Authors,
    Year,
    Venue,
    EntryType,
    Doi,
    Extras,
}

impl FieldKind {
    pub const ALL: [FieldKind; 7] = [
        FieldKind::Title,
        FieldKind::Authors,
        FieldKind::Year,
        FieldKind::Venue,
        FieldKind::EntryType,
        FieldKind::Doi,
        FieldKind::Extras,
    ];
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Title => f.write_str("title"),
            Self::Authors => f.write_str("authors"),
            Self::Year => f.write_str("year"),
            Self::Venue => f.write_str("venue"),
            Self::EntryType => f.write_str("entry_type"),
            Self::Doi => f.write_str("doi"),
            Self::Extra(key) => write!(f, "extra:{key}"),
        }
    }
}

/// One publication after merging, with per-field provenance.
///
/// Only the merge engine builds these; once built they are read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub(crate) title: Option<Sourced<String>>,
    pub(crate) authors: Option<Sourced<Vec<String>>>,
    pub(crate) year: Option<Sourced<i32>>,
    pub(crate) venue: Option<Sourced<String>>,
    pub(crate) entry_type: Sourced<EntryType>,
    pub(crate) doi: Option<Sourced<String>>,
    pub(crate) extras: BTreeMap<String, Sourced<String>>,
    pub(crate) validated_sources: BTreeSet<Source>,
    pub(crate) baseline_source: Source,
}

impl CanonicalRecord {
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_ref().map(|sourced| sourced.value.as_str())
    }

    #[must_use]
    pub fn authors(&self) -> &[String] {
        match &self.authors {
            Some(sourced) => &sourced.value,
            None => &[],
        }
    }

    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.year.as_ref().map(|sourced| sourced.value)
    }

    #[must_use]
    pub fn venue(&self) -> Option<&str> {
        self.venue.as_ref().map(|sourced| sourced.value.as_str())
    }

    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        self.entry_type.value
    }

    #[must_use]
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_ref().map(|sourced| sourced.value.as_str())
    }

    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).map(|sourced| sourced.value.as_str())
    }

    pub fn extras(&self) -> impl Iterator<Item = (&str, &str)> {
        self.extras
            .iter()
            .map(|(key, sourced)| (key.as_str(), sourced.value.as_str()))
    }

    /// Number of distinct validated sources that supplied a counted field.
    #[must_use]
    pub fn trust_hits(&self) -> usize {
        self.validated_sources.len()
    }

    /// The validated sources behind [`Self::trust_hits`]. Never includes the
    /// baseline.
    #[must_use]
    pub fn validated_sources(&self) -> &BTreeSet<Source> {
        &self.validated_sources
    }

    /// Source of the baseline the work was seeded from.
    #[must_use]
    pub fn baseline_source(&self) -> Source {
        self.baseline_source
    }

    /// Which source supplied each populated field.
    #[must_use]
    pub fn provenance(&self) -> BTreeMap<Field, Source> {
        let mut map = BTreeMap::new();
        if let Some(sourced) = &self.title {
            map.insert(Field::Title, sourced.source);
        }
        if let Some(sourced) = &self.authors {
            map.insert(Field::Authors, sourced.source);
        }
        if let Some(sourced) = &self.year {
            map.insert(Field::Year, sourced.source);
        }
        if let Some(sourced) = &self.venue {
            map.insert(Field::Venue, sourced.source);
        }
        map.insert(Field::EntryType, self.entry_type.source);
        if let Some(sourced) = &self.doi {
            map.insert(Field::Doi, sourced.source);
        }
        for (key, sourced) in &self.extras {
            map.insert(Field::Extra(key.clone()), sourced.source);
        }
        map
    }

    /// Every source that appears anywhere in the provenance map.
    #[must_use]
    pub fn contributing_sources(&self) -> BTreeSet<Source> {
        self.provenance().into_values().collect()
    }
}
