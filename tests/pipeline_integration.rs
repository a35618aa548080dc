//! Integration tests for the article pipeline against mocked APIs.
//!
//! Every source runs over real HTTP; sources without a matching mock see a 404
//! and report "not found".

use std::sync::Arc;

use citeforge_core::pipeline::WorkSeed;
use citeforge_core::{
    ArticleError, ArticlePipeline, AuthorRecord, BibtexStore, EntryType, RawCandidate,
    RetryPolicy, Source, TrustOrder,
};
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::fixtures::{mount_crossref, mount_doi, quiet_config, registry};
use support::socket_guard::start_mock_server_or_skip;

const TITLE: &str = "Deep Learning for X";

fn seed(title: &str) -> WorkSeed {
    WorkSeed::new(
        RawCandidate::new(Source::ScholarBaseline)
            .with_title(title)
            .with_authors(["Jane Doe", "Alan Smith"])
            .with_year(2024),
    )
}

fn author() -> AuthorRecord {
    AuthorRecord::new("Jane Doe").with_dblp("Jane Doe")
}

#[tokio::test]
async fn test_crossref_doi_is_locked_through_doi_org() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_crossref(&server, TITLE, 2024, "10.1000/abc").await;
    mount_doi(&server, "10.1000/abc", TITLE, 2024).await;

    let dir = TempDir::new().unwrap();
    let mut config = quiet_config();
    config.output.dir = dir.path().to_path_buf();
    let pipeline = ArticlePipeline::new(
        &config,
        Arc::new(TrustOrder::default()),
        Arc::new(registry(&server, &config)),
        Arc::new(BibtexStore::new(&config.output)),
    )
    .with_retry_policy(RetryPolicy::immediate(0));

    let report = pipeline.run(&author(), &seed(TITLE)).await.unwrap();
    let record = &report.record;
    assert_eq!(record.doi(), Some("10.1000/abc"));
    assert_eq!(record.title(), Some(TITLE));
    assert_eq!(record.venue(), Some("Journal of X"));
    assert_eq!(record.entry_type(), EntryType::Journal);

    let sources = record.contributing_sources();
    assert!(sources.contains(&Source::Csl), "sources: {sources:?}");
    assert!(sources.contains(&Source::Crossref), "sources: {sources:?}");
    assert!(report.failures.is_empty(), "failures: {:?}", report.failures);

    let saved = std::fs::read_to_string(&report.path).unwrap();
    assert!(saved.starts_with("@article{"), "saved: {saved}");
    assert!(saved.contains("doi = {10.1000/abc}"), "saved: {saved}");
    assert!(saved.contains("number = {3}"), "saved: {saved}");
    assert!(report.path.starts_with(dir.path()));
}

#[tokio::test]
async fn test_no_source_answers_keeps_baseline() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    let mut config = quiet_config();
    config.output.dir = dir.path().to_path_buf();
    let pipeline = ArticlePipeline::new(
        &config,
        Arc::new(TrustOrder::default()),
        Arc::new(registry(&server, &config)),
        Arc::new(BibtexStore::new(&config.output)),
    );

    let report = pipeline
        .run(&author(), &seed("Soil Chemistry of Mars"))
        .await
        .unwrap();
    assert_eq!(report.record.doi(), None);
    assert_eq!(report.record.year(), Some(2024));
    assert_eq!(
        report.record.contributing_sources().into_iter().collect::<Vec<_>>(),
        vec![Source::ScholarBaseline]
    );
    assert!(report.path.exists());
}

#[tokio::test]
async fn test_server_errors_are_recorded_not_fatal() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = quiet_config();
    config.output.dir = dir.path().to_path_buf();
    let pipeline = ArticlePipeline::new(
        &config,
        Arc::new(TrustOrder::default()),
        Arc::new(registry(&server, &config)),
        Arc::new(BibtexStore::new(&config.output)),
    )
    .with_retry_policy(RetryPolicy::immediate(0));

    let report = pipeline.run(&author(), &seed(TITLE)).await.unwrap();
    assert!(!report.failures.is_empty());
    assert!(report.failures.iter().any(|failure| failure.source == Source::Crossref));
    assert_eq!(report.record.title(), Some(TITLE));
}

#[tokio::test]
async fn test_seed_without_title_or_doi_is_rejected() {
    let config = quiet_config();
    let dir = TempDir::new().unwrap();
    let mut output = config.output.clone();
    output.dir = dir.path().to_path_buf();
    let pipeline = ArticlePipeline::new(
        &config,
        Arc::new(TrustOrder::default()),
        Arc::new(citeforge_core::SourceRegistry::empty()),
        Arc::new(BibtexStore::new(&output)),
    );

    let seed = WorkSeed::new(RawCandidate::new(Source::ScholarBaseline).with_year(2024));
    let error = pipeline.run(&author(), &seed).await.unwrap_err();
    assert!(matches!(error, ArticleError::InsufficientBaseline { .. }));
}
