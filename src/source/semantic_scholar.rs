//! Semantic Scholar Graph API paper search.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::json::LooseInt;
use super::{FetchOutcome, HttpFetcher, SourceCollaborator, SourceError, WorkHint, with_query};
use crate::record::{RawCandidate, Source};
use crate::text::clean_title;

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org";

const FIELDS: &str =
    "paperId,title,year,venue,publicationTypes,authors,url,journal,externalIds,publicationDate";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    paper_id: Option<String>,
    title: Option<String>,
    year: Option<LooseInt>,
    venue: Option<String>,
    publication_types: Option<Vec<String>>,
    #[serde(default)]
    authors: Vec<PaperAuthor>,
    url: Option<String>,
    journal: Option<Journal>,
    #[serde(default)]
    external_ids: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PaperAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Journal {
    name: Option<String>,
    volume: Option<String>,
    pages: Option<String>,
}

impl Paper {
    fn external_id(&self, key: &str) -> Option<String> {
        match self.external_ids.get(key)? {
            serde_json::Value::String(value) => Some(value.clone()),
            serde_json::Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    fn into_candidate(self) -> RawCandidate {
        let doi = self.external_id("DOI");
        let arxiv = self.external_id("ArXiv");
        let mut candidate = RawCandidate::new(Source::SemanticScholar)
            .with_authors(self.authors.into_iter().filter_map(|author| author.name));
        if let Some(title) = self.title {
            candidate = candidate.with_title(clean_title(&title));
        }
        if let Some(year) = self.year.as_ref().and_then(LooseInt::as_year) {
            candidate = candidate.with_year(year);
        }
        let journal_name = self.journal.as_ref().and_then(|journal| journal.name.clone());
        if let Some(venue) = journal_name.or(self.venue) {
            candidate = candidate.with_venue(venue);
        }
        if let Some(doi) = doi {
            candidate = candidate.with_doi(doi);
        }
        if let Some(hint) = self.publication_types.and_then(|types| types.into_iter().next()) {
            candidate = candidate.with_entry_type_hint(hint);
        }
        if let Some(arxiv) = arxiv {
            candidate = candidate
                .with_extra("eprint", arxiv)
                .with_extra("archiveprefix", "arXiv");
        }
        if let Some(journal) = self.journal {
            if let Some(volume) = journal.volume {
                candidate = candidate.with_extra("volume", volume);
            }
            if let Some(pages) = journal.pages {
                candidate = candidate.with_extra("pages", pages);
            }
        }
        if let Some(url) = self.url {
            candidate = candidate.with_extra(super::LANDING_URL_KEY, url);
        }
        if let Some(paper_id) = self.paper_id {
            candidate = candidate.with_extra("x_s2_paper_id", paper_id);
        }
        candidate
    }
}

/// Semantic Scholar `/graph/v1/paper/search`; the API key is optional.
#[derive(Clone)]
pub struct SemanticScholarSource {
    http: HttpFetcher,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for SemanticScholarSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticScholarSource")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl SemanticScholarSource {
    #[must_use]
    pub fn new(http: HttpFetcher, api_key: Option<String>) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL, api_key)
    }

    #[must_use]
    pub fn with_base_url(
        http: HttpFetcher,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl SourceCollaborator for SemanticScholarSource {
    fn source(&self) -> Source {
        Source::SemanticScholar
    }

    #[tracing::instrument(skip(self, hint), fields(source = "s2"))]
    async fn fetch(&self, hint: &WorkHint) -> Result<FetchOutcome, SourceError> {
        let Some(title) = hint.query_title() else {
            debug!("no title to search for");
            return Ok(FetchOutcome::NotFound);
        };
        let limit = (hint.max_candidates * 2).to_string();
        let url = with_query(
            &format!("{}/graph/v1/paper/search", self.base_url),
            &[
                ("query", title.as_str()),
                ("limit", limit.as_str()),
                ("fields", FIELDS),
            ],
        );
        let headers: Vec<(&'static str, &str)> = self
            .api_key
            .as_deref()
            .map(|key| ("x-api-key", key))
            .into_iter()
            .collect();

        let Some(response) = self
            .http
            .get_json::<SearchResponse>(Source::SemanticScholar, &url, &headers)
            .await?
        else {
            return Ok(FetchOutcome::NotFound);
        };
        let candidates = response
            .data
            .into_iter()
            .map(Paper::into_candidate)
            .collect();
        Ok(FetchOutcome::ranked(candidates, hint))
    }
}
