//! Source collaborators: the bibliographic APIs that supply raw candidates.
//!
//! # Architecture
//!
//! - [`SourceCollaborator`] - search one API for the work described by a [`WorkHint`]
//! - [`DoiResolver`] - turn a DOI into high-trust CSL and BibTeX candidates
//! - [`DiscoverySource`] - list an author's works to seed baselines
//! - [`PageFetcher`] - scrape a landing page for an embedded DOI
//! - [`SourceRegistry`] - the configured set of all of the above
//!
//! Collaborators perform a single HTTP attempt per call. Timeouts and retries
//! are applied by the caller through [`RetryPolicy::run`].

mod arxiv;
mod crossref;
mod dblp;
mod doi_resolver;
mod error;
mod europepmc;
mod http_client;
mod json;
mod landing_page;
mod openalex;
mod openreview;
mod pubmed;
pub mod rate_limiter;
mod registry;
pub mod retry;
mod scholar;
mod semantic_scholar;

pub use arxiv::ArxivSource;
pub use crossref::CrossrefSource;
pub use dblp::DblpDiscovery;
pub use doi_resolver::DoiOrgResolver;
pub use error::SourceError;
pub use europepmc::EuropePmcSource;
pub use http_client::{HttpFetcher, build_http_client, default_user_agent};
pub use landing_page::LandingPageFetcher;
pub use openalex::OpenAlexSource;
pub use openreview::OpenReviewSource;
pub use pubmed::PubmedSource;
pub use rate_limiter::RateLimiter;
pub use registry::{SourceEndpoints, SourceRegistry};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
pub use scholar::{ScholarCitationSource, ScholarProfileDiscovery};
pub use semantic_scholar::SemanticScholarSource;

use async_trait::async_trait;

use crate::author::AuthorRecord;
use crate::record::{RawCandidate, Source};
use crate::text::{names, strip_markup, title_similarity};

/// Extra key carrying the Scholar citation id of a listed work.
pub const SCHOLAR_CITATION_ID_KEY: &str = "x_scholar_citation_id";

/// Extra key carrying the Scholar profile id the work was listed under.
pub const SCHOLAR_AUTHOR_ID_KEY: &str = "x_scholar_author_id";

/// Extra key carrying a landing-page URL worth scanning for a DOI.
pub const LANDING_URL_KEY: &str = "x_landing_url";

/// What a source is asked to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkHint {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub scholar_citation_id: Option<String>,
    pub scholar_author_id: Option<String>,
    /// Upper bound on ranked candidates a source should return.
    pub max_candidates: usize,
}

impl WorkHint {
    /// Hint describing `baseline`.
    #[must_use]
    pub fn from_baseline(baseline: &RawCandidate, max_candidates: usize) -> Self {
        Self {
            title: baseline.title.clone(),
            authors: baseline.authors.clone(),
            year: baseline.year,
            doi: baseline.doi.clone(),
            scholar_citation_id: baseline.extras.get(SCHOLAR_CITATION_ID_KEY).cloned(),
            scholar_author_id: baseline.extras.get(SCHOLAR_AUTHOR_ID_KEY).cloned(),
            max_candidates: max_candidates.max(1),
        }
    }

    /// Title with markup removed, suitable for a search query.
    #[must_use]
    pub fn query_title(&self) -> Option<String> {
        self.title
            .as_deref()
            .map(strip_markup)
            .filter(|title| !title.is_empty())
    }

    /// Display surname of the first author, used to narrow searches.
    #[must_use]
    pub fn first_author_surname(&self) -> Option<String> {
        self.authors.first().and_then(|name| names::surname(name))
    }
}

/// Result of one successful source call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Ranked candidates, best first; never empty.
    Candidates(Vec<RawCandidate>),
    NotFound,
}

impl FetchOutcome {
    /// `NotFound` for an empty list, otherwise the list truncated to `limit`.
    #[must_use]
    pub fn from_candidates(mut candidates: Vec<RawCandidate>, limit: usize) -> Self {
        candidates.retain(RawCandidate::has_evidence);
        candidates.truncate(limit.max(1));
        if candidates.is_empty() {
            Self::NotFound
        } else {
            Self::Candidates(candidates)
        }
    }

    /// Orders search hits by title similarity to the hint, then truncates.
    /// Equal scores keep the API's own relevance order.
    #[must_use]
    pub fn ranked(mut candidates: Vec<RawCandidate>, hint: &WorkHint) -> Self {
        if let Some(wanted) = hint.title.as_deref() {
            let mut scored: Vec<(f64, RawCandidate)> = candidates
                .into_iter()
                .map(|candidate| {
                    let score = candidate
                        .title
                        .as_deref()
                        .map_or(0.0, |title| title_similarity(wanted, title));
                    (score, candidate)
                })
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            candidates = scored.into_iter().map(|(_, candidate)| candidate).collect();
        }
        Self::from_candidates(candidates, hint.max_candidates)
    }
}

/// One bibliographic API.
///
/// Implementations must be safe to call concurrently and must report
/// transient network failures as [`SourceError`], never by panicking.
#[async_trait]
pub trait SourceCollaborator: Send + Sync {
    /// The trust tier every candidate from this collaborator carries.
    fn source(&self) -> Source;

    /// Expensive sources are skipped when the work was seeded from a saved record.
    fn is_expensive(&self) -> bool {
        false
    }

    /// Searches for the work.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status or parse failures.
    async fn fetch(&self, hint: &WorkHint) -> Result<FetchOutcome, SourceError>;
}

/// Outcome of resolving a DOI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoiResolution {
    /// The DOI exists. Either form may be missing when the registrar does
    /// not offer it.
    Found {
        csl: Option<RawCandidate>,
        bibtex: Option<RawCandidate>,
    },
    NotFound,
}

impl DoiResolution {
    /// The candidates carried by a `Found` resolution, CSL first.
    #[must_use]
    pub fn into_candidates(self) -> Vec<RawCandidate> {
        match self {
            Self::Found { csl, bibtex } => csl.into_iter().chain(bibtex).collect(),
            Self::NotFound => Vec::new(),
        }
    }
}

#[async_trait]
pub trait DoiResolver: Send + Sync {
    /// Resolves a normalized DOI.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the registrar cannot be reached.
    async fn resolve(&self, doi: &str) -> Result<DoiResolution, SourceError>;
}

/// Lists an author's works.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Up to `limit` listed works, newest first when the API allows it.
    /// `Ok(None)` means this source has no id for the author and was not tried.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the listing cannot be fetched.
    async fn list_works(
        &self,
        author: &AuthorRecord,
        limit: usize,
    ) -> Result<Option<Vec<RawCandidate>>, SourceError>;
}

/// Fetches a landing page and extracts an embedded DOI.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SourceError`] when the page cannot be fetched.
    async fn find_doi(&self, url: &str) -> Result<Option<String>, SourceError>;
}

/// Appends `key=value` query pairs, URL-encoding every value.
pub(crate) fn with_query(base: &str, pairs: &[(&str, &str)]) -> String {
    let query: Vec<String> = pairs
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect();
    if query.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", query.join("&"))
    }
}
