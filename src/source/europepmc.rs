//! Europe PMC REST search.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::json::LooseInt;
use super::{FetchOutcome, HttpFetcher, SourceCollaborator, SourceError, WorkHint, with_query};
use crate::record::{RawCandidate, Source};
use crate::text::clean_title;

pub(crate) const DEFAULT_BASE_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    result_list: Option<ResultList>,
}

#[derive(Debug, Deserialize)]
struct ResultList {
    #[serde(default)]
    result: Vec<PmcResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PmcResult {
    title: Option<String>,
    author_string: Option<String>,
    pub_year: Option<LooseInt>,
    journal_title: Option<String>,
    book_title: Option<String>,
    doi: Option<String>,
    pmid: Option<String>,
    pub_type: Option<String>,
    journal_volume: Option<String>,
    issue: Option<String>,
    page_info: Option<String>,
}

impl PmcResult {
    fn into_candidate(self) -> RawCandidate {
        let authors: Vec<String> = self
            .author_string
            .as_deref()
            .map(|list| {
                list.trim_end_matches('.')
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let mut candidate = RawCandidate::new(Source::Europepmc).with_authors(authors);
        if let Some(title) = self.title {
            candidate = candidate.with_title(clean_title(&title));
        }
        if let Some(year) = self.pub_year.as_ref().and_then(LooseInt::as_year) {
            candidate = candidate.with_year(year);
        }
        if let Some(venue) = self.journal_title.or(self.book_title) {
            candidate = candidate.with_venue(venue);
        }
        if let Some(doi) = self.doi {
            candidate = candidate.with_doi(doi);
        }
        if let Some(pub_type) = self.pub_type {
            candidate = candidate.with_entry_type_hint(pub_type);
        }
        for (key, value) in [
            ("pmid", self.pmid),
            ("volume", self.journal_volume),
            ("number", self.issue),
            ("pages", self.page_info),
        ] {
            if let Some(value) = value {
                candidate = candidate.with_extra(key, value);
            }
        }
        candidate
    }
}

/// Europe PMC `/search` collaborator.
#[derive(Debug, Clone)]
pub struct EuropePmcSource {
    http: HttpFetcher,
    base_url: String,
}

impl EuropePmcSource {
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
impl SourceCollaborator for EuropePmcSource {
    fn source(&self) -> Source {
        Source::Europepmc
    }

    #[tracing::instrument(skip(self, hint), fields(source = "europepmc"))]
    async fn fetch(&self, hint: &WorkHint) -> Result<FetchOutcome, SourceError> {
        let Some(title) = hint.query_title() else {
            debug!("no title to search for");
            return Ok(FetchOutcome::NotFound);
        };
        let mut query = format!("TITLE:\"{}\"", title.replace('"', " "));
        if let Some(surname) = hint.first_author_surname() {
            query.push_str(&format!(" AND AUTH:\"{surname}\""));
        }
        let page_size = (hint.max_candidates * 2).to_string();
        let url = with_query(
            &format!("{}/search", self.base_url),
            &[
                ("query", query.as_str()),
                ("format", "json"),
                ("pageSize", page_size.as_str()),
            ],
        );

        let Some(response) = self
            .http
            .get_json::<SearchResponse>(Source::Europepmc, &url, &[])
            .await?
        else {
            return Ok(FetchOutcome::NotFound);
        };
        let candidates = response
            .result_list
            .map(|list| list.result)
            .unwrap_or_default()
            .into_iter()
            .map(PmcResult::into_candidate)
            .collect();
        Ok(FetchOutcome::ranked(candidates, hint))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_maps_results() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let body = serde_json::json!({
            "hitCount": 1,
            "resultList": {"result": [{
                "title": "Gut microbiome and sleep.",
                "authorString": "Kim J, Park S, Lee H.",
                "pubYear": "2022",
                "journalTitle": "Nat Med",
                "doi": "10.1038/s41591-022-0001",
                "pmid": "35000001",
                "pubType": "journal article",
                "journalVolume": "28",
                "issue": "4",
                "pageInfo": "100-110"
            }]}
        });
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("format", "json"))
            .and(query_param(
                "query",
                "TITLE:\"Gut microbiome and sleep\" AND AUTH:\"Kim\"",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let source =
            EuropePmcSource::with_base_url(HttpFetcher::unthrottled().unwrap(), server.uri());
        let hint = WorkHint::from_baseline(
            &RawCandidate::new(Source::ScholarBaseline)
                .with_title("Gut microbiome and sleep")
                .with_authors(["J Kim"]),
            1,
        );
        let FetchOutcome::Candidates(candidates) = source.fetch(&hint).await.unwrap() else {
            panic!("expected candidates");
        };
        let result = &candidates[0];
        assert_eq!(result.title.as_deref(), Some("Gut microbiome and sleep"));
        assert_eq!(result.authors, vec!["Kim J", "Park S", "Lee H"]);
        assert_eq!(result.year, Some(2022));
        assert_eq!(result.venue.as_deref(), Some("Nat Med"));
        assert_eq!(result.extras.get("pmid").map(String::as_str), Some("35000001"));
        assert_eq!(result.extras.get("pages").map(String::as_str), Some("100-110"));
    }

    #[tokio::test]
    async fn test_missing_result_list_is_not_found() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"hitCount": 0})))
            .mount(&server)
            .await;

        let source =
            EuropePmcSource::with_base_url(HttpFetcher::unthrottled().unwrap(), server.uri());
        let hint = WorkHint::from_baseline(
            &RawCandidate::new(Source::ScholarBaseline).with_title("Nothing here"),
            1,
        );
        assert_eq!(source.fetch(&hint).await.unwrap(), FetchOutcome::NotFound);
    }
}
