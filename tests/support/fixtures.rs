//! Mock API responses and a registry pointed at one wiremock server.

use citeforge_core::source::{HttpFetcher, SourceEndpoints};
use citeforge_core::{ApiKeys, EngineConfig, SourceRegistry, TrustOrder};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CSL_ACCEPT: &str = "application/vnd.citationstyles.csl+json";
pub const BIBTEX_ACCEPT: &str = "application/x-bibtex";

/// Stock config with no article delay and no retries.
pub fn quiet_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.concurrency.article_delay_ms = 0;
    config.sources.max_retries = 0;
    config
}

/// Registry with every endpoint on `server` and no API keys.
pub fn registry(server: &MockServer, config: &EngineConfig) -> SourceRegistry {
    SourceRegistry::build(
        config,
        &TrustOrder::default(),
        &ApiKeys::default(),
        &SourceEndpoints::all(&server.uri()),
        &HttpFetcher::unthrottled().unwrap(),
    )
}

/// One DBLP hit authored by Jane Doe.
pub fn dblp_hit(title: &str, year: i32) -> Value {
    json!({"info": {
        "authors": {"author": [
            {"@pid": "1", "text": "Jane Doe 0001"},
            {"@pid": "2", "text": "Alan Smith"}
        ]},
        "title": format!("{title}."),
        "venue": "ICML",
        "year": year.to_string(),
        "type": "Conference and Workshop Papers"
    }})
}

pub async fn mount_dblp(server: &MockServer, hits: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/search/publ/api"))
        .and(query_param("q", "Jane Doe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"hits": {"@total": hits.len().to_string(), "hit": hits}}
        })))
        .mount(server)
        .await;
}

/// Crossref search answering `title` with one journal article carrying `doi`.
/// Only Crossref knows the issue number.
pub async fn mount_crossref(server: &MockServer, title: &str, year: i32, doi: &str) {
    Mock::given(method("GET"))
        .and(path("/works"))
        .and(query_param("query.bibliographic", title))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "message": {"items": [{
                "title": [title],
                "author": [{"given": "Jane", "family": "Doe"}, {"given": "Alan", "family": "Smith"}],
                "issued": {"date-parts": [[year, 3]]},
                "container-title": ["Journal of X"],
                "DOI": doi.to_uppercase(),
                "type": "journal-article",
                "volume": "12",
                "issue": "3",
                "page": "1-10"
            }]}
        })))
        .mount(server)
        .await;
}

/// doi.org content negotiation for `doi`, in both CSL and BibTeX form.
pub async fn mount_doi(server: &MockServer, doi: &str, title: &str, year: i32) {
    Mock::given(method("GET"))
        .and(path(format!("/{doi}")))
        .and(header("accept", CSL_ACCEPT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "article-journal",
            "title": title,
            "author": [{"family": "Doe", "given": "Jane"}, {"family": "Smith", "given": "Alan"}],
            "issued": {"date-parts": [[year]]},
            "container-title": "Journal of X",
            "DOI": doi,
            "volume": 12,
            "page": "1-10"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{doi}")))
        .and(header("accept", BIBTEX_ACCEPT))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "@article{{Doe_{year}, title={{{title}}}, author={{Doe, Jane and Smith, Alan}}, \
             journal={{Journal of X}}, year={{{year}}}, doi={{{doi}}}}}"
        )))
        .mount(server)
        .await;
}
