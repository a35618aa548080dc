//! Crossref bibliographic search.
//!
//! Queries `https://api.crossref.org/works?query.bibliographic=...` and maps
//! each item of `message.items` to a [`RawCandidate`]. Requests carry the
//! contact address as `mailto` so they land in Crossref's polite pool.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::json::{DateParts, OneOrMany, first_text};
use super::{FetchOutcome, HttpFetcher, SourceCollaborator, SourceError, WorkHint, with_query};
use crate::record::{RawCandidate, Source};
use crate::text::clean_title;

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.crossref.org";

#[derive(Debug, Deserialize)]
struct CrossrefResponse {
    message: CrossrefMessage,
}

#[derive(Debug, Default, Deserialize)]
struct CrossrefMessage {
    #[serde(default)]
    items: Vec<CrossrefWork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CrossrefWork {
    title: Option<OneOrMany<String>>,
    #[serde(default)]
    author: Vec<CrossrefAuthor>,
    issued: Option<DateParts>,
    published_print: Option<DateParts>,
    published_online: Option<DateParts>,
    container_title: Option<OneOrMany<String>>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "type")]
    work_type: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    page: Option<String>,
    publisher: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossrefAuthor {
    given: Option<String>,
    family: Option<String>,
    /// Organizational authors only carry a name.
    name: Option<String>,
}

impl CrossrefAuthor {
    fn display(&self) -> Option<String> {
        match (self.family.as_deref(), self.given.as_deref()) {
            (Some(family), Some(given)) => Some(format!("{family}, {given}")),
            (Some(family), None) => Some(family.to_string()),
            _ => self.name.clone(),
        }
    }
}

impl CrossrefWork {
    fn year(&self) -> Option<i32> {
        [&self.issued, &self.published_print, &self.published_online]
            .into_iter()
            .flatten()
            .find_map(DateParts::year)
    }

    fn into_candidate(self) -> RawCandidate {
        let year = self.year();
        let mut candidate = RawCandidate::new(Source::Crossref)
            .with_authors(self.author.iter().filter_map(CrossrefAuthor::display));
        if let Some(title) = first_text(self.title) {
            candidate = candidate.with_title(clean_title(&title));
        }
        if let Some(year) = year {
            candidate = candidate.with_year(year);
        }
        if let Some(venue) = first_text(self.container_title) {
            candidate = candidate.with_venue(venue);
        }
        if let Some(doi) = self.doi {
            candidate = candidate.with_doi(doi);
        }
        if let Some(work_type) = self.work_type {
            candidate = candidate.with_entry_type_hint(work_type);
        }
        for (key, value) in [
            ("volume", self.volume),
            ("number", self.issue),
            ("pages", self.page),
            ("publisher", self.publisher),
        ] {
            if let Some(value) = value {
                candidate = candidate.with_extra(key, value);
            }
        }
        candidate
    }
}

/// Crossref `/works` search.
#[derive(Debug, Clone)]
pub struct CrossrefSource {
    http: HttpFetcher,
    base_url: String,
    mailto: Option<String>,
}

impl CrossrefSource {
    #[must_use]
    pub fn new(http: HttpFetcher, mailto: Option<String>) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL, mailto)
    }

    /// Source pointed at a custom base URL (for testing with wiremock).
    #[must_use]
    pub fn with_base_url(
        http: HttpFetcher,
        base_url: impl Into<String>,
        mailto: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            mailto,
        }
    }

    fn search_url(&self, title: &str, hint: &WorkHint) -> String {
        let rows = (hint.max_candidates * 2).to_string();
        let author = hint.first_author_surname();
        let mut pairs = vec![("query.bibliographic", title), ("rows", rows.as_str())];
        if let Some(author) = author.as_deref() {
            pairs.push(("query.author", author));
        }
        if let Some(mailto) = self.mailto.as_deref() {
            pairs.push(("mailto", mailto));
        }
        with_query(&format!("{}/works", self.base_url), &pairs)
    }
}

#[async_trait]
impl SourceCollaborator for CrossrefSource {
    fn source(&self) -> Source {
        Source::Crossref
    }

    #[tracing::instrument(skip(self, hint), fields(source = "crossref"))]
    async fn fetch(&self, hint: &WorkHint) -> Result<FetchOutcome, SourceError> {
        let Some(title) = hint.query_title() else {
            debug!("no title to search for");
            return Ok(FetchOutcome::NotFound);
        };
        let url = self.search_url(&title, hint);
        let Some(response) = self
            .http
            .get_json::<CrossrefResponse>(Source::Crossref, &url, &[])
            .await?
        else {
            return Ok(FetchOutcome::NotFound);
        };
        let candidates = response
            .message
            .items
            .into_iter()
            .map(CrossrefWork::into_candidate)
            .collect();
        Ok(FetchOutcome::ranked(candidates, hint))
    }
}
