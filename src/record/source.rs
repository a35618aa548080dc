//! Source identifiers and the immutable trust order used to resolve field conflicts.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A data source that can contribute a candidate record for a work.
///
/// The declaration order is the default trust order, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// CSL-JSON obtained by DOI content negotiation.
    Csl,
    /// BibTeX obtained by DOI content negotiation.
    DoiBibtex,
    Datacite,
    Pubmed,
    Europepmc,
    Crossref,
    Openalex,
    /// Semantic Scholar.
    #[serde(rename = "s2")]
    SemanticScholar,
    Orcid,
    Openreview,
    Arxiv,
    /// Scholar citation detail page.
    ScholarPage,
    /// Scholar-Baseline: the discovery listing entry a work starts from.
    #[serde(rename = "scholar_min")]
    ScholarBaseline,
}

impl Source {
    /// Every source, in default trust order.
    pub const ALL: [Source; 13] = [
        Source::Csl,
        Source::DoiBibtex,
        Source::Datacite,
        Source::Pubmed,
        Source::Europepmc,
        Source::Crossref,
        Source::Openalex,
        Source::SemanticScholar,
        Source::Orcid,
        Source::Openreview,
        Source::Arxiv,
        Source::ScholarPage,
        Source::ScholarBaseline,
    ];

    /// Sources whose DOI field is trusted when no DOI was locked by the resolver.
    pub const DOI_TRUSTED: [Source; 6] = [
        Source::Csl,
        Source::DoiBibtex,
        Source::Datacite,
        Source::Pubmed,
        Source::Europepmc,
        Source::Crossref,
    ];

    /// Stable identifier used in config files and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csl => "csl",
            Self::DoiBibtex => "doi_bibtex",
            Self::Datacite => "datacite",
            Self::Pubmed => "pubmed",
            Self::Europepmc => "europepmc",
            Self::Crossref => "crossref",
            Self::Openalex => "openalex",
            Self::SemanticScholar => "s2",
            Self::Orcid => "orcid",
            Self::Openreview => "openreview",
            Self::Arxiv => "arxiv",
            Self::ScholarPage => "scholar_page",
            Self::ScholarBaseline => "scholar_min",
        }
    }

    #[must_use]
    pub fn is_doi_trusted(self) -> bool {
        Self::DOI_TRUSTED.contains(&self)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from parsing source names or building a trust order.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrustOrderError {
    #[error("unknown source `{0}`\n  Suggestion: use one of {names}", names = known_names())]
    UnknownSource(String),

    #[error("source `{0}` appears more than once in the trust order")]
    Duplicate(Source),

    #[error("source `{0}` is missing from the trust order\n  Suggestion: list all 13 sources")]
    Missing(Source),
}

fn known_names() -> String {
    Source::ALL
        .iter()
        .map(|source| source.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for Source {
    type Err = TrustOrderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Source::ALL
            .iter()
            .copied()
            .find(|source| source.as_str() == wanted)
            .ok_or_else(|| TrustOrderError::UnknownSource(value.to_string()))
    }
}

/// Total order over all sources, highest trust first.
///
/// Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustOrder {
    order: Vec<Source>,
}

impl TrustOrder {
    /// Builds a trust order from a permutation of all sources.
    ///
    /// # Errors
    ///
    /// Returns [`TrustOrderError`] if a source is repeated or missing.
    pub fn new(order: Vec<Source>) -> Result<Self, TrustOrderError> {
        let mut seen = HashSet::new();
        for source in &order {
            if !seen.insert(*source) {
                return Err(TrustOrderError::Duplicate(*source));
            }
        }
        if let Some(missing) = Source::ALL.iter().find(|source| !seen.contains(source)) {
            return Err(TrustOrderError::Missing(*missing));
        }
        Ok(Self { order })
    }

    /// Position of `source` in the order; 0 is the most trusted.
    #[must_use]
    pub fn rank(&self, source: Source) -> usize {
        self.order
            .iter()
            .position(|candidate| *candidate == source)
            .unwrap_or(self.order.len())
    }

    /// Compares two sources so that the more trusted one sorts first.
    #[must_use]
    pub fn compare(&self, a: Source, b: Source) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }

    pub fn iter(&self) -> impl Iterator<Item = Source> + '_ {
        self.order.iter().copied()
    }
}

impl Default for TrustOrder {
    fn default() -> Self {
        Self {
            order: Source::ALL.to_vec(),
        }
    }
}
