//! Google Scholar through SerpAPI: the author profile listing used for
//! discovery and the per-work citation page used for enrichment.
//!
//! Both calls cost SerpAPI credits. The citation page is marked expensive so
//! works seeded from a saved record skip it.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use super::json::{LooseInt, OneOrMany, year_from_text};
use super::{
    DiscoverySource, FetchOutcome, HttpFetcher, SCHOLAR_AUTHOR_ID_KEY, SCHOLAR_CITATION_ID_KEY,
    SourceCollaborator, SourceError, WorkHint, with_query,
};
use crate::author::AuthorRecord;
use crate::parser::find_arxiv_id;
use crate::record::{RawCandidate, Source};
use crate::text::{clean_title, is_placeholder, names::is_et_al};

pub(crate) const DEFAULT_BASE_URL: &str = "https://serpapi.com";

/// Scholar's maximum page size for profile listings.
const PAGE_SIZE: usize = 100;

/// Hard stop on profile pagination.
const MAX_PAGES: usize = 10;

/// Trailing `, 2021` on Scholar's publication line.
#[allow(clippy::expect_used)]
static TRAILING_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",?\s*(?:18|19|20)\d{2}\s*$").expect("trailing year regex is valid"));

/// Splits Scholar's comma-joined author line, dropping truncation markers.
fn split_authors(raw: OneOrMany<String>) -> Vec<String> {
    raw.into_vec()
        .iter()
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty() && !is_et_al(name) && !is_placeholder(name))
        .map(str::to_string)
        .collect()
}

/// Records the first arXiv id mentioned in `texts` as the work's eprint.
fn with_arxiv_eprint<'a>(
    candidate: RawCandidate,
    texts: impl IntoIterator<Item = &'a str>,
) -> RawCandidate {
    match texts.into_iter().find_map(find_arxiv_id) {
        Some(id) => candidate
            .with_extra("eprint", id)
            .with_extra("archiveprefix", "arXiv"),
        None => candidate,
    }
}

// ==================== Citation page ====================

#[derive(Debug, Deserialize)]
struct CitationResponse {
    citation: Option<Citation>,
}

#[derive(Debug, Deserialize)]
struct Citation {
    title: Option<String>,
    authors: Option<OneOrMany<String>>,
    publication_date: Option<String>,
    journal: Option<String>,
    conference: Option<String>,
    book: Option<String>,
    source: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    pages: Option<String>,
    publisher: Option<String>,
    link: Option<String>,
    #[serde(default)]
    resources: Vec<CitationResource>,
}

#[derive(Debug, Deserialize)]
struct CitationResource {
    link: Option<String>,
}

impl Citation {
    fn into_candidate(self) -> RawCandidate {
        let (venue, hint) = match (self.journal, self.conference, self.book, self.source) {
            (Some(journal), ..) => (Some(journal), Some("journal")),
            (None, Some(conference), ..) => (Some(conference), Some("conference")),
            (None, None, Some(book), _) => (Some(book), Some("book")),
            (None, None, None, source) => (source, None),
        };
        let links: Vec<String> = self
            .link
            .into_iter()
            .chain(self.resources.into_iter().filter_map(|resource| resource.link))
            .collect();
        let mut candidate = RawCandidate::new(Source::ScholarPage)
            .with_authors(self.authors.map(split_authors).unwrap_or_default());
        candidate = with_arxiv_eprint(candidate, links.iter().map(String::as_str));
        if let Some(title) = self.title {
            candidate = candidate.with_title(clean_title(&title));
        }
        if let Some(year) = self.publication_date.as_deref().and_then(year_from_text) {
            candidate = candidate.with_year(year);
        }
        if let Some(venue) = venue {
            candidate = candidate.with_venue(venue);
        }
        if let Some(hint) = hint {
            candidate = candidate.with_entry_type_hint(hint);
        }
        for (key, value) in [
            ("volume", self.volume),
            ("number", self.issue),
            ("pages", self.pages),
            ("publisher", self.publisher),
        ] {
            if let Some(value) = value {
                candidate = candidate.with_extra(key, value);
            }
        }
        candidate
    }
}

/// Scholar citation detail page (`view_op=view_citation`).
#[derive(Clone)]
pub struct ScholarCitationSource {
    http: HttpFetcher,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for ScholarCitationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScholarCitationSource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ScholarCitationSource {
    #[must_use]
    pub fn new(http: HttpFetcher, api_key: impl Into<String>) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL, api_key)
    }

    #[must_use]
    pub fn with_base_url(
        http: HttpFetcher,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SourceCollaborator for ScholarCitationSource {
    fn source(&self) -> Source {
        Source::ScholarPage
    }

    fn is_expensive(&self) -> bool {
        true
    }

    #[tracing::instrument(skip(self, hint), fields(source = "scholar_page"))]
    async fn fetch(&self, hint: &WorkHint) -> Result<FetchOutcome, SourceError> {
        let (Some(citation_id), Some(author_id)) = (
            hint.scholar_citation_id.as_deref(),
            hint.scholar_author_id.as_deref(),
        ) else {
            debug!("work was not listed on a Scholar profile");
            return Ok(FetchOutcome::NotFound);
        };
        let url = with_query(
            &format!("{}/search.json", self.base_url),
            &[
                ("engine", "google_scholar_author"),
                ("view_op", "view_citation"),
                ("author_id", author_id),
                ("citation_id", citation_id),
                ("api_key", self.api_key.as_str()),
            ],
        );
        let citation = self
            .http
            .get_json::<CitationResponse>(Source::ScholarPage, &url, &[])
            .await?
            .and_then(|response| response.citation);
        Ok(match citation {
            Some(citation) => FetchOutcome::from_candidates(vec![citation.into_candidate()], 1),
            None => FetchOutcome::NotFound,
        })
    }
}

// ==================== Profile listing ====================

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    articles: Vec<ProfileArticle>,
}

#[derive(Debug, Deserialize)]
struct ProfileArticle {
    title: Option<String>,
    authors: Option<OneOrMany<String>>,
    publication: Option<String>,
    year: Option<LooseInt>,
    citation_id: Option<String>,
    link: Option<String>,
}

impl ProfileArticle {
    fn into_candidate(self, author_id: &str) -> RawCandidate {
        let mut candidate = RawCandidate::new(Source::ScholarBaseline)
            .with_authors(self.authors.map(split_authors).unwrap_or_default())
            .with_extra(SCHOLAR_AUTHOR_ID_KEY, author_id);
        if let Some(title) = self.title {
            candidate = candidate.with_title(clean_title(&title));
        }
        let year = self
            .year
            .as_ref()
            .and_then(LooseInt::as_year)
            .or_else(|| self.publication.as_deref().and_then(year_from_text));
        if let Some(year) = year {
            candidate = candidate.with_year(year);
        }
        candidate = with_arxiv_eprint(
            candidate,
            [self.publication.as_deref(), self.link.as_deref()]
                .into_iter()
                .flatten(),
        );
        if let Some(publication) = self.publication {
            candidate = candidate.with_venue(TRAILING_YEAR.replace(&publication, ""));
        }
        if let Some(citation_id) = self.citation_id {
            candidate = candidate.with_extra(SCHOLAR_CITATION_ID_KEY, citation_id);
        }
        if let Some(link) = self.link {
            candidate = candidate.with_extra(super::LANDING_URL_KEY, link);
        }
        candidate
    }
}

/// Scholar profile listing, newest first. Primary discovery source.
#[derive(Clone)]
pub struct ScholarProfileDiscovery {
    http: HttpFetcher,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for ScholarProfileDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScholarProfileDiscovery")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ScholarProfileDiscovery {
    #[must_use]
    pub fn new(http: HttpFetcher, api_key: impl Into<String>) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL, api_key)
    }

    #[must_use]
    pub fn with_base_url(
        http: HttpFetcher,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn page(&self, author_id: &str, start: usize) -> Result<Vec<ProfileArticle>, SourceError> {
        let num = PAGE_SIZE.to_string();
        let start = start.to_string();
        let url = with_query(
            &format!("{}/search.json", self.base_url),
            &[
                ("engine", "google_scholar_author"),
                ("author_id", author_id),
                ("sort", "pubdate"),
                ("num", num.as_str()),
                ("start", start.as_str()),
                ("api_key", self.api_key.as_str()),
            ],
        );
        Ok(self
            .http
            .get_json::<ProfileResponse>(Source::ScholarBaseline, &url, &[])
            .await?
            .map(|response| response.articles)
            .unwrap_or_default())
    }
}

#[async_trait]
impl DiscoverySource for ScholarProfileDiscovery {
    fn name(&self) -> &'static str {
        "scholar"
    }

    #[tracing::instrument(skip(self, author), fields(author = %author.name))]
    async fn list_works(
        &self,
        author: &AuthorRecord,
        limit: usize,
    ) -> Result<Option<Vec<RawCandidate>>, SourceError> {
        let author_id = author.scholar_id.trim();
        if author_id.is_empty() {
            return Ok(None);
        }

        let mut works = Vec::new();
        for page in 0..MAX_PAGES {
            if works.len() >= limit {
                break;
            }
            let articles = self.page(author_id, page * PAGE_SIZE).await?;
            let page_len = articles.len();
            works.extend(
                articles
                    .into_iter()
                    .map(|article| article.into_candidate(author_id))
                    .filter(RawCandidate::has_evidence),
            );
            if page_len < PAGE_SIZE {
                break;
            }
        }
        works.truncate(limit);
        info!(count = works.len(), "listed Scholar profile");
        Ok(Some(works))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_split_authors_drops_truncation() {
        let authors = split_authors(OneOrMany::One("J Doe, A Smith, ...".to_string()));
        assert_eq!(authors, vec!["J Doe", "A Smith"]);
    }

    #[tokio::test]
    async fn test_profile_listing_builds_baselines() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("author_id", "AUTH1"))
            .and(query_param("sort", "pubdate"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "articles": [
                    {
                        "title": "Deep Learning for X",
                        "authors": "J Doe, A Smith",
                        "publication": "Journal of X 12 (3), 2023",
                        "year": "2023",
                        "citation_id": "AUTH1:abc",
                        "link": "https://scholar.google.com/citations?view_op=view_citation&citation_for_view=AUTH1:abc"
                    },
                    {
                        "title": "Sparse Attention Revisited",
                        "authors": "J Doe",
                        "publication": "arXiv preprint arXiv:2101.00001, 2021",
                        "citation_id": "AUTH1:def"
                    },
                    {"title": "", "authors": "Nobody"}
                ]
            })))
            .mount(&server)
            .await;

        let discovery = ScholarProfileDiscovery::with_base_url(
            HttpFetcher::unthrottled().unwrap(),
            server.uri(),
            "serp-key",
        );
        let author = AuthorRecord::new("Jane Doe").with_scholar_id("AUTH1");
        let works = discovery.list_works(&author, 10).await.unwrap().unwrap();
        assert_eq!(works.len(), 2);
        let work = &works[0];
        assert_eq!(work.source, Source::ScholarBaseline);
        assert_eq!(work.year, Some(2023));
        assert_eq!(work.venue.as_deref(), Some("Journal of X 12 (3)"));
        assert_eq!(
            work.extras.get(SCHOLAR_CITATION_ID_KEY).map(String::as_str),
            Some("AUTH1:abc")
        );
        assert_eq!(
            work.extras.get(SCHOLAR_AUTHOR_ID_KEY).map(String::as_str),
            Some("AUTH1")
        );
        assert!(!work.extras.contains_key("eprint"));

        let preprint = &works[1];
        assert_eq!(preprint.year, Some(2021));
        assert_eq!(preprint.extras.get("eprint").map(String::as_str), Some("2101.00001"));
        assert_eq!(
            preprint.extras.get("archiveprefix").map(String::as_str),
            Some("arXiv")
        );
    }

    #[tokio::test]
    async fn test_profile_listing_without_id_is_not_applicable() {
        let discovery = ScholarProfileDiscovery::with_base_url(
            HttpFetcher::unthrottled().unwrap(),
            "http://127.0.0.1:9",
            "serp-key",
        );
        let author = AuthorRecord::new("Jane Doe").with_dblp("Jane Doe");
        assert!(discovery.list_works(&author, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_citation_page_maps_fields() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("view_op", "view_citation"))
            .and(query_param("citation_id", "AUTH1:abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "citation": {
                    "title": "Deep Learning for X",
                    "authors": "Jane Doe, Alan Smith",
                    "publication_date": "2023/5/1",
                    "conference": "Proceedings of the X Conference",
                    "pages": "1-9",
                    "resources": [
                        {"title": "arxiv.org", "file_format": "PDF", "link": "https://arxiv.org/pdf/2305.01234v2"}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let source = ScholarCitationSource::with_base_url(
            HttpFetcher::unthrottled().unwrap(),
            server.uri(),
            "serp-key",
        );
        assert!(source.is_expensive());
        let baseline = RawCandidate::new(Source::ScholarBaseline)
            .with_title("Deep Learning for X")
            .with_extra(SCHOLAR_CITATION_ID_KEY, "AUTH1:abc")
            .with_extra(SCHOLAR_AUTHOR_ID_KEY, "AUTH1");
        let outcome = source
            .fetch(&WorkHint::from_baseline(&baseline, 1))
            .await
            .unwrap();
        let FetchOutcome::Candidates(candidates) = outcome else {
            panic!("expected candidates");
        };
        let page = &candidates[0];
        assert_eq!(page.authors, vec!["Jane Doe", "Alan Smith"]);
        assert_eq!(page.year, Some(2023));
        assert_eq!(page.venue.as_deref(), Some("Proceedings of the X Conference"));
        assert_eq!(page.entry_type_hint.as_deref(), Some("conference"));
        assert_eq!(page.extras.get("eprint").map(String::as_str), Some("2305.01234"));
    }

    #[tokio::test]
    async fn test_citation_page_needs_ids() {
        let source = ScholarCitationSource::with_base_url(
            HttpFetcher::unthrottled().unwrap(),
            "http://127.0.0.1:9",
            "serp-key",
        );
        let baseline = RawCandidate::new(Source::ScholarBaseline).with_title("T");
        assert_eq!(
            source
                .fetch(&WorkHint::from_baseline(&baseline, 1))
                .await
                .unwrap(),
            FetchOutcome::NotFound
        );
    }
}
