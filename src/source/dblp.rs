//! DBLP publication search used as the secondary discovery source.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use super::json::{LooseInt, OneOrMany, first_text};
use super::{DiscoverySource, HttpFetcher, SourceError, with_query};
use crate::author::AuthorRecord;
use crate::record::{RawCandidate, Source};
use crate::text::{NameSignature, clean_title};

pub(crate) const DEFAULT_BASE_URL: &str = "https://dblp.org";

/// DBLP caps `h` at 1000 hits per request.
const MAX_HITS: usize = 1000;

/// Homonym disambiguators such as `Jane Doe 0001` or `Jane Doe (0001)`.
#[allow(clippy::expect_used)]
static HOMONYM_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?:\(\d{4}\)|\d{4})\s*$").expect("homonym suffix regex is valid")
});

fn strip_homonym(name: &str) -> String {
    HOMONYM_SUFFIX.replace(name.trim(), "").into_owned()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hit: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    info: HitInfo,
}

#[derive(Debug, Deserialize)]
struct HitInfo {
    title: Option<String>,
    authors: Option<HitAuthors>,
    venue: Option<OneOrMany<String>>,
    year: Option<LooseInt>,
    #[serde(rename = "type")]
    kind: Option<String>,
    doi: Option<String>,
    ee: Option<OneOrMany<String>>,
}

#[derive(Debug, Deserialize)]
struct HitAuthors {
    author: OneOrMany<HitAuthor>,
}

#[derive(Debug, Deserialize)]
struct HitAuthor {
    text: String,
}

impl HitInfo {
    fn author_names(&self) -> Vec<String> {
        self.authors
            .as_ref()
            .map(|authors| match &authors.author {
                OneOrMany::One(author) => vec![strip_homonym(&author.text)],
                OneOrMany::Many(list) => list.iter().map(|a| strip_homonym(&a.text)).collect(),
            })
            .unwrap_or_default()
    }

    fn into_candidate(self) -> RawCandidate {
        let mut candidate = RawCandidate::new(Source::ScholarBaseline).with_authors(self.author_names());
        if let Some(title) = self.title {
            candidate = candidate.with_title(clean_title(&title));
        }
        if let Some(year) = self.year.as_ref().and_then(LooseInt::as_year) {
            candidate = candidate.with_year(year);
        }
        if let Some(venue) = first_text(self.venue) {
            candidate = candidate.with_venue(venue);
        }
        if let Some(doi) = self.doi {
            candidate = candidate.with_doi(doi);
        }
        if let Some(kind) = self.kind {
            candidate = candidate.with_entry_type_hint(kind);
        }
        if let Some(ee) = first_text(self.ee) {
            candidate = candidate.with_extra(super::LANDING_URL_KEY, ee);
        }
        candidate
    }
}

/// DBLP `/search/publ/api` listing filtered to the author's name.
#[derive(Debug, Clone)]
pub struct DblpDiscovery {
    http: HttpFetcher,
    base_url: String,
}

impl DblpDiscovery {
    #[must_use]
    pub fn new(http: HttpFetcher) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    #[must_use]
    pub fn with_base_url(http: HttpFetcher, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DiscoverySource for DblpDiscovery {
    fn name(&self) -> &'static str {
        "dblp"
    }

    #[tracing::instrument(skip(self, author), fields(author = %author.name))]
    async fn list_works(
        &self,
        author: &AuthorRecord,
        limit: usize,
    ) -> Result<Option<Vec<RawCandidate>>, SourceError> {
        let query_name = author.dblp.trim();
        if query_name.is_empty() {
            return Ok(None);
        }
        let Some(wanted) = NameSignature::parse(&strip_homonym(query_name))
            .or_else(|| NameSignature::parse(&author.name))
        else {
            return Err(SourceError::Discovery {
                name: "dblp",
                message: format!("cannot parse author name `{query_name}`"),
            });
        };

        let hits = limit.clamp(1, MAX_HITS).to_string();
        let url = with_query(
            &format!("{}/search/publ/api", self.base_url),
            &[("q", query_name), ("format", "json"), ("h", hits.as_str())],
        );
        let Some(response) = self
            .http
            .get_json::<SearchResponse>(Source::ScholarBaseline, &url, &[])
            .await?
        else {
            return Ok(Some(Vec::new()));
        };

        let total = response.result.hits.hit.len();
        let mut works: Vec<RawCandidate> = response
            .result
            .hits
            .hit
            .into_iter()
            .filter(|hit| {
                hit.info.author_names().iter().any(|name| {
                    NameSignature::parse(name).is_some_and(|sig| sig.is_compatible(&wanted))
                })
            })
            .map(|hit| hit.info.into_candidate())
            .filter(RawCandidate::has_evidence)
            .collect();
        works.truncate(limit);
        debug!(total, kept = works.len(), "filtered DBLP hits by author name");
        info!(count = works.len(), "listed DBLP works");
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
    fn test_strip_homonym_suffix() {
        assert_eq!(strip_homonym("Jane Doe 0001"), "Jane Doe");
        assert_eq!(strip_homonym("Jane Doe (0002)"), "Jane Doe");
        assert_eq!(strip_homonym("Jane Doe"), "Jane Doe");
    }

    #[tokio::test]
    async fn test_list_works_filters_by_author() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let body = serde_json::json!({
            "result": {"hits": {"@total": "2", "hit": [
                {"info": {
                    "authors": {"author": [
                        {"@pid": "1", "text": "Jane Doe 0001"},
                        {"@pid": "2", "text": "Alan Smith"}
                    ]},
                    "title": "Deep Learning for X.",
                    "venue": "ICML",
                    "year": "2023",
                    "type": "Conference and Workshop Papers",
                    "doi": "10.1000/ABC",
                    "ee": "https://doi.org/10.1000/ABC"
                }},
                {"info": {
                    "authors": {"author": {"@pid": "3", "text": "Other Person"}},
                    "title": "Unrelated Work.",
                    "venue": ["J. X", "J. Y"],
                    "year": "2022"
                }}
            ]}}
        });
        Mock::given(method("GET"))
            .and(path("/search/publ/api"))
            .and(query_param("q", "Jane Doe"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let discovery =
            DblpDiscovery::with_base_url(HttpFetcher::unthrottled().unwrap(), server.uri());
        let author = AuthorRecord::new("Jane Doe").with_dblp("Jane Doe");
        let works = discovery.list_works(&author, 50).await.unwrap().unwrap();
        assert_eq!(works.len(), 1);
        let work = &works[0];
        assert_eq!(work.source, Source::ScholarBaseline);
        assert_eq!(work.title.as_deref(), Some("Deep Learning for X"));
        assert_eq!(work.authors, vec!["Jane Doe", "Alan Smith"]);
        assert_eq!(work.doi.as_deref(), Some("10.1000/abc"));
        assert_eq!(work.year, Some(2023));
    }

    #[tokio::test]
    async fn test_list_works_without_dblp_name_is_not_applicable() {
        let discovery =
            DblpDiscovery::with_base_url(HttpFetcher::unthrottled().unwrap(), "http://127.0.0.1:9");
        let author = AuthorRecord::new("Jane Doe").with_scholar_id("abc");
        assert!(discovery.list_works(&author, 5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_works_with_no_hits() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/search/publ/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"hits": {"@total": "0"}}
            })))
            .mount(&server)
            .await;

        let discovery =
            DblpDiscovery::with_base_url(HttpFetcher::unthrottled().unwrap(), server.uri());
        let author = AuthorRecord::new("Jane Doe").with_dblp("Jane Doe");
        assert!(discovery.list_works(&author, 5).await.unwrap().unwrap().is_empty());
    }
}
