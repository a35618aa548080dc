//! DOI resolution through doi.org content negotiation.
//!
//! One DOI is requested twice: once as CSL-JSON and once as BibTeX. Each
//! form becomes its own high-trust candidate.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::json::{DateParts, OneOrMany, first_text};
use super::{DoiResolution, DoiResolver, HttpFetcher, SourceError};
use crate::parser::parse_bibtex;
use crate::record::{RawCandidate, Source};
use crate::text::clean_title;

pub(crate) const DEFAULT_BASE_URL: &str = "https://doi.org";

const CSL_ACCEPT: &str = "application/vnd.citationstyles.csl+json";
const BIBTEX_ACCEPT: &str = "application/x-bibtex";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CslItem {
    title: Option<OneOrMany<String>>,
    #[serde(default)]
    author: Vec<CslName>,
    issued: Option<DateParts>,
    published_print: Option<DateParts>,
    published_online: Option<DateParts>,
    container_title: Option<OneOrMany<String>>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "type")]
    item_type: Option<String>,
    volume: Option<serde_json::Value>,
    issue: Option<serde_json::Value>,
    page: Option<String>,
    publisher: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CslName {
    family: Option<String>,
    given: Option<String>,
    literal: Option<String>,
}

impl CslName {
    fn display(&self) -> Option<String> {
        match (self.family.as_deref(), self.given.as_deref()) {
            (Some(family), Some(given)) => Some(format!("{family}, {given}")),
            (Some(family), None) => Some(family.to_string()),
            _ => self.literal.clone(),
        }
    }
}

/// Volume and issue arrive as strings or numbers depending on the registrar.
fn scalar_text(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(text) => Some(text),
        serde_json::Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

impl CslItem {
    fn into_candidate(self, requested: &str) -> RawCandidate {
        let year = [&self.issued, &self.published_print, &self.published_online]
            .into_iter()
            .flatten()
            .find_map(DateParts::year);
        let mut candidate = RawCandidate::new(Source::Csl)
            .with_authors(self.author.iter().filter_map(CslName::display))
            .with_doi(self.doi.as_deref().unwrap_or(requested));
        if let Some(title) = first_text(self.title) {
            candidate = candidate.with_title(clean_title(&title));
        }
        if let Some(year) = year {
            candidate = candidate.with_year(year);
        }
        if let Some(venue) = first_text(self.container_title) {
            candidate = candidate.with_venue(venue);
        }
        if let Some(item_type) = self.item_type {
            candidate = candidate.with_entry_type_hint(item_type);
        }
        for (key, value) in [
            ("volume", scalar_text(self.volume)),
            ("number", scalar_text(self.issue)),
            ("pages", self.page),
            ("publisher", self.publisher),
            ("url", self.url),
        ] {
            if let Some(value) = value {
                candidate = candidate.with_extra(key, value);
            }
        }
        candidate
    }
}

/// Outcome of one content-negotiation request.
enum Negotiated {
    Body(String),
    Missing,
}

/// doi.org resolver.
#[derive(Debug, Clone)]
pub struct DoiOrgResolver {
    http: HttpFetcher,
    base_url: String,
}

impl DoiOrgResolver {
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

    async fn negotiate(
        &self,
        origin: Source,
        doi: &str,
        accept: &str,
    ) -> Result<Negotiated, SourceError> {
        let encoded: Vec<_> = doi.split('/').map(urlencoding::encode).collect();
        let url = format!("{}/{}", self.base_url, encoded.join("/"));
        Ok(match self.http.get_text(origin, &url, Some(accept), &[]).await? {
            Some(body) if !body.trim().is_empty() => Negotiated::Body(body),
            _ => Negotiated::Missing,
        })
    }

    fn csl_candidate(body: &str, doi: &str) -> Option<RawCandidate> {
        match serde_json::from_str::<CslItem>(body) {
            Ok(item) => Some(item.into_candidate(doi)),
            Err(error) => {
                debug!(doi, error = %error, "CSL body did not parse");
                None
            }
        }
    }

    fn bibtex_candidate(body: &str, doi: &str) -> Option<RawCandidate> {
        let parsed = parse_bibtex(body);
        let entry = parsed.entries.into_iter().next()?;
        let mut candidate = entry.to_candidate(Source::DoiBibtex);
        if candidate.doi.is_none() {
            candidate = candidate.with_doi(doi);
        }
        Some(candidate)
    }
}

#[async_trait]
impl DoiResolver for DoiOrgResolver {
    #[tracing::instrument(skip(self), fields(resolver = "doi.org"))]
    async fn resolve(&self, doi: &str) -> Result<DoiResolution, SourceError> {
        let (csl, bibtex) = tokio::join!(
            self.negotiate(Source::Csl, doi, CSL_ACCEPT),
            self.negotiate(Source::DoiBibtex, doi, BIBTEX_ACCEPT),
        );

        let (csl, bibtex) = match (csl, bibtex) {
            (Err(error), Err(_) | Ok(Negotiated::Missing))
            | (Ok(Negotiated::Missing), Err(error)) => return Err(error),
            (Ok(Negotiated::Missing), Ok(Negotiated::Missing)) => {
                debug!(doi, "DOI not registered");
                return Ok(DoiResolution::NotFound);
            }
            (csl, bibtex) => (csl, bibtex),
        };

        let csl = match csl {
            Ok(Negotiated::Body(body)) => Self::csl_candidate(&body, doi),
            Ok(Negotiated::Missing) => None,
            Err(error) => {
                warn!(doi, error = %error, "CSL negotiation failed");
                None
            }
        };
        let bibtex = match bibtex {
            Ok(Negotiated::Body(body)) => Self::bibtex_candidate(&body, doi),
            Ok(Negotiated::Missing) => None,
            Err(error) => {
                warn!(doi, error = %error, "BibTeX negotiation failed");
                None
            }
        };
        Ok(DoiResolution::Found { csl, bibtex })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn resolver(uri: String) -> DoiOrgResolver {
        DoiOrgResolver::with_base_url(HttpFetcher::unthrottled().unwrap(), uri)
    }

    #[tokio::test]
    async fn test_resolve_returns_both_forms() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/10.1000/abc"))
            .and(header("accept", CSL_ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "article-journal",
                "title": "Deep Learning for X",
                "author": [{"family": "Doe", "given": "Jane"}],
                "issued": {"date-parts": [[2023]]},
                "container-title": "Journal of X",
                "DOI": "10.1000/ABC",
                "volume": 12,
                "page": "1-10"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/10.1000/abc"))
            .and(header("accept", BIBTEX_ACCEPT))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "@article{Doe_2023, title={Deep Learning for X}, author={Doe, Jane}, \
                 journal={Journal of X}, year={2023}, doi={10.1000/abc}}",
            ))
            .mount(&server)
            .await;

        let resolution = resolver(server.uri()).resolve("10.1000/abc").await.unwrap();
        let DoiResolution::Found { csl, bibtex } = resolution else {
            panic!("expected a resolution");
        };
        let csl = csl.unwrap();
        assert_eq!(csl.source, Source::Csl);
        assert_eq!(csl.authors, vec!["Doe, Jane"]);
        assert_eq!(csl.venue.as_deref(), Some("Journal of X"));
        assert_eq!(csl.doi.as_deref(), Some("10.1000/abc"));
        assert_eq!(csl.extras.get("volume").map(String::as_str), Some("12"));

        let bibtex = bibtex.unwrap();
        assert_eq!(bibtex.source, Source::DoiBibtex);
        assert_eq!(bibtex.year, Some(2023));
    }

    #[tokio::test]
    async fn test_resolve_404_on_both_is_not_found() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resolution = resolver(server.uri()).resolve("10.1000/missing").await.unwrap();
        assert_eq!(resolution, DoiResolution::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_one_failure_still_found() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(header("accept", CSL_ACCEPT))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("accept", BIBTEX_ACCEPT))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("@misc{k, title={Only BibTeX}, year={2020}}"),
            )
            .mount(&server)
            .await;

        let resolution = resolver(server.uri()).resolve("10.1000/half").await.unwrap();
        let DoiResolution::Found { csl, bibtex } = resolution else {
            panic!("expected a resolution");
        };
        assert!(csl.is_none());
        let bibtex = bibtex.unwrap();
        assert_eq!(bibtex.doi.as_deref(), Some("10.1000/half"));
    }

    #[tokio::test]
    async fn test_resolve_both_failing_is_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = resolver(server.uri()).resolve("10.1000/down").await;
        assert!(matches!(result, Err(SourceError::HttpStatus { status: 503, .. })));
    }
}
