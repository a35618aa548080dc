//! PubMed via NCBI E-utilities: `esearch` for PMIDs, then `esummary` for metadata.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::json::year_from_text;
use super::{FetchOutcome, HttpFetcher, SourceCollaborator, SourceError, WorkHint, with_query};
use crate::record::{RawCandidate, Source};
use crate::text::clean_title;

pub(crate) const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    esearchresult: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    result: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Summary {
    uid: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authors: Vec<SummaryAuthor>,
    pubdate: Option<String>,
    fulljournalname: Option<String>,
    source: Option<String>,
    #[serde(default)]
    articleids: Vec<ArticleId>,
    volume: Option<String>,
    issue: Option<String>,
    pages: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    idtype: Option<String>,
    value: Option<String>,
}

impl Summary {
    fn into_candidate(self) -> RawCandidate {
        let doi = self
            .articleids
            .iter()
            .find(|id| id.idtype.as_deref() == Some("doi"))
            .and_then(|id| id.value.clone());
        let mut candidate = RawCandidate::new(Source::Pubmed)
            .with_authors(self.authors.into_iter().filter_map(|author| author.name))
            .with_entry_type_hint("journal-article");
        if let Some(title) = self.title {
            candidate = candidate.with_title(clean_title(&title));
        }
        if let Some(year) = self.pubdate.as_deref().and_then(year_from_text) {
            candidate = candidate.with_year(year);
        }
        if let Some(venue) = self.fulljournalname.or(self.source) {
            candidate = candidate.with_venue(venue);
        }
        if let Some(doi) = doi {
            candidate = candidate.with_doi(doi);
        }
        for (key, value) in [
            ("pmid", self.uid),
            ("volume", self.volume),
            ("number", self.issue),
            ("pages", self.pages),
        ] {
            if let Some(value) = value {
                candidate = candidate.with_extra(key, value);
            }
        }
        candidate
    }
}

/// PubMed E-utilities collaborator.
#[derive(Debug, Clone)]
pub struct PubmedSource {
    http: HttpFetcher,
    base_url: String,
}

impl PubmedSource {
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

    async fn search_ids(&self, title: &str, hint: &WorkHint) -> Result<Vec<String>, SourceError> {
        let mut term = format!("{title}[Title]");
        if let Some(surname) = hint.first_author_surname() {
            term.push_str(&format!(" AND {surname}[Author]"));
        }
        let retmax = (hint.max_candidates * 2).to_string();
        let url = with_query(
            &format!("{}/esearch.fcgi", self.base_url),
            &[
                ("db", "pubmed"),
                ("term", term.as_str()),
                ("retmax", retmax.as_str()),
                ("retmode", "json"),
            ],
        );
        let response = self
            .http
            .get_json::<SearchResponse>(Source::Pubmed, &url, &[])
            .await?;
        Ok(response
            .and_then(|response| response.esearchresult)
            .map(|result| result.idlist)
            .unwrap_or_default())
    }
}

#[async_trait]
impl SourceCollaborator for PubmedSource {
    fn source(&self) -> Source {
        Source::Pubmed
    }

    #[tracing::instrument(skip(self, hint), fields(source = "pubmed"))]
    async fn fetch(&self, hint: &WorkHint) -> Result<FetchOutcome, SourceError> {
        let Some(title) = hint.query_title() else {
            debug!("no title to search for");
            return Ok(FetchOutcome::NotFound);
        };
        let ids = self.search_ids(&title, hint).await?;
        if ids.is_empty() {
            return Ok(FetchOutcome::NotFound);
        }

        let joined = ids.join(",");
        let url = with_query(
            &format!("{}/esummary.fcgi", self.base_url),
            &[("db", "pubmed"), ("id", joined.as_str()), ("retmode", "json")],
        );
        let Some(mut response) = self
            .http
            .get_json::<SummaryResponse>(Source::Pubmed, &url, &[])
            .await?
        else {
            return Ok(FetchOutcome::NotFound);
        };

        let mut candidates = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(value) = response.result.remove(id) else {
                continue;
            };
            match serde_json::from_value::<Summary>(value) {
                Ok(summary) => candidates.push(summary.into_candidate()),
                Err(error) => debug!(pmid = %id, error = %error, "skipping malformed summary"),
            }
        }
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
    async fn test_fetch_chains_search_and_summary() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .and(query_param("term", "Sleep and memory[Title]"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "esearchresult": {"count": "1", "idlist": ["111"]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/esummary.fcgi"))
            .and(query_param("id", "111"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {
                    "uids": ["111"],
                    "111": {
                        "uid": "111",
                        "title": "Sleep and memory.",
                        "authors": [{"name": "Walker MP"}],
                        "pubdate": "2009 Jan",
                        "fulljournalname": "Annals of the New York Academy of Sciences",
                        "articleids": [
                            {"idtype": "pubmed", "value": "111"},
                            {"idtype": "doi", "value": "10.1111/j.1749-6632.2008.03700.x"}
                        ],
                        "volume": "1156",
                        "pages": "168-97"
                    }
                }
            })))
            .mount(&server)
            .await;

        let source = PubmedSource::with_base_url(HttpFetcher::unthrottled().unwrap(), server.uri());
        let hint = WorkHint::from_baseline(
            &RawCandidate::new(Source::ScholarBaseline).with_title("Sleep and memory"),
            1,
        );
        let FetchOutcome::Candidates(candidates) = source.fetch(&hint).await.unwrap() else {
            panic!("expected candidates");
        };
        let summary = &candidates[0];
        assert_eq!(summary.source, Source::Pubmed);
        assert_eq!(summary.title.as_deref(), Some("Sleep and memory"));
        assert_eq!(summary.year, Some(2009));
        assert_eq!(summary.doi.as_deref(), Some("10.1111/j.1749-6632.2008.03700.x"));
        assert_eq!(summary.extras.get("pmid").map(String::as_str), Some("111"));
    }

    #[tokio::test]
    async fn test_empty_id_list_is_not_found() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "esearchresult": {"count": "0", "idlist": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = PubmedSource::with_base_url(HttpFetcher::unthrottled().unwrap(), server.uri());
        let hint = WorkHint::from_baseline(
            &RawCandidate::new(Source::ScholarBaseline).with_title("Nothing"),
            1,
        );
        assert_eq!(source.fetch(&hint).await.unwrap(), FetchOutcome::NotFound);
    }
}
