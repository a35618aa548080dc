//! OpenAlex works search.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::json::LooseInt;
use super::{FetchOutcome, HttpFetcher, SourceCollaborator, SourceError, WorkHint, with_query};
use crate::record::{RawCandidate, Source};
use crate::text::clean_title;

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.openalex.org";

#[derive(Debug, Deserialize)]
struct OpenAlexResponse {
    #[serde(default)]
    results: Vec<OpenAlexWork>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    title: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    publication_year: Option<LooseInt>,
    primary_location: Option<Location>,
    /// `https://doi.org/...` form.
    doi: Option<String>,
    #[serde(rename = "type")]
    work_type: Option<String>,
    biblio: Option<Biblio>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<AuthorRef>,
}

#[derive(Debug, Deserialize)]
struct AuthorRef {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    source: Option<LocationSource>,
    landing_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocationSource {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Biblio {
    volume: Option<String>,
    issue: Option<String>,
    first_page: Option<String>,
    last_page: Option<String>,
}

impl Biblio {
    fn pages(&self) -> Option<String> {
        match (self.first_page.as_deref(), self.last_page.as_deref()) {
            (Some(first), Some(last)) if first != last => Some(format!("{first}--{last}")),
            (Some(first), _) => Some(first.to_string()),
            _ => None,
        }
    }
}

impl OpenAlexWork {
    fn into_candidate(self) -> RawCandidate {
        let authors: Vec<String> = self
            .authorships
            .into_iter()
            .filter_map(|authorship| authorship.author?.display_name)
            .collect();
        let mut candidate = RawCandidate::new(Source::Openalex).with_authors(authors);
        if let Some(title) = self.title.or(self.display_name) {
            candidate = candidate.with_title(clean_title(&title));
        }
        if let Some(year) = self.publication_year.as_ref().and_then(LooseInt::as_year) {
            candidate = candidate.with_year(year);
        }
        if let Some(location) = self.primary_location {
            if let Some(venue) = location.source.and_then(|source| source.display_name) {
                candidate = candidate.with_venue(venue);
            }
            if let Some(landing) = location.landing_page_url {
                candidate = candidate.with_extra(super::LANDING_URL_KEY, landing);
            }
        }
        if let Some(doi) = self.doi {
            candidate = candidate.with_doi(doi);
        }
        if let Some(work_type) = self.work_type {
            candidate = candidate.with_entry_type_hint(work_type);
        }
        if let Some(biblio) = self.biblio {
            if let Some(pages) = biblio.pages() {
                candidate = candidate.with_extra("pages", pages);
            }
            if let Some(volume) = biblio.volume {
                candidate = candidate.with_extra("volume", volume);
            }
            if let Some(issue) = biblio.issue {
                candidate = candidate.with_extra("number", issue);
            }
        }
        candidate
    }
}

/// OpenAlex `/works?search=` collaborator.
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    http: HttpFetcher,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexSource {
    #[must_use]
    pub fn new(http: HttpFetcher, mailto: Option<String>) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL, mailto)
    }

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
}

#[async_trait]
impl SourceCollaborator for OpenAlexSource {
    fn source(&self) -> Source {
        Source::Openalex
    }

    #[tracing::instrument(skip(self, hint), fields(source = "openalex"))]
    async fn fetch(&self, hint: &WorkHint) -> Result<FetchOutcome, SourceError> {
        let Some(title) = hint.query_title() else {
            debug!("no title to search for");
            return Ok(FetchOutcome::NotFound);
        };
        let per_page = (hint.max_candidates * 2).to_string();
        let mut pairs = vec![("search", title.as_str()), ("per-page", per_page.as_str())];
        if let Some(mailto) = self.mailto.as_deref() {
            pairs.push(("mailto", mailto));
        }
        let url = with_query(&format!("{}/works", self.base_url), &pairs);

        let Some(response) = self
            .http
            .get_json::<OpenAlexResponse>(Source::Openalex, &url, &[])
            .await?
        else {
            return Ok(FetchOutcome::NotFound);
        };
        let candidates = response
            .results
            .into_iter()
            .map(OpenAlexWork::into_candidate)
            .collect();
        Ok(FetchOutcome::ranked(candidates, hint))
    }
}
