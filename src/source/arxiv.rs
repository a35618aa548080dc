//! arXiv Atom API search.
//!
//! The feed is small and regular, so entries are pulled apart with regexes
//! rather than a full XML parser.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{FetchOutcome, HttpFetcher, SourceCollaborator, SourceError, WorkHint, with_query};
use crate::parser::find_arxiv_id;
use crate::record::{RawCandidate, Source};
use crate::text::{clean_title, collapse_whitespace};

pub(crate) const DEFAULT_BASE_URL: &str = "https://export.arxiv.org";

/// Venue used when an entry has no journal reference.
pub const ARXIV_VENUE: &str = "arXiv preprint";

#[allow(clippy::expect_used)]
static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("entry regex is valid"));
#[allow(clippy::expect_used)]
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title[^>]*>(.*?)</title>").expect("title regex is valid"));
#[allow(clippy::expect_used)]
static AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("author regex is valid")
});
#[allow(clippy::expect_used)]
static PUBLISHED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<published>\s*(\d{4})-").expect("published regex is valid")
});
#[allow(clippy::expect_used)]
static ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<id>\s*(.*?)\s*</id>").expect("id regex is valid"));
#[allow(clippy::expect_used)]
static DOI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<arxiv:doi[^>]*>(.*?)</arxiv:doi>").expect("doi regex is valid")
});
#[allow(clippy::expect_used)]
static JOURNAL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<arxiv:journal_ref[^>]*>(.*?)</arxiv:journal_ref>")
        .expect("journal_ref regex is valid")
});
#[allow(clippy::expect_used)]
static PRIMARY_CATEGORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<arxiv:primary_category[^>]*term="([^"]+)""#)
        .expect("primary category regex is valid")
});

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .map(|caps| collapse_whitespace(&unescape_xml(&caps[1])))
        .filter(|value| !value.is_empty())
}

/// Parses an Atom feed into candidates, in feed order.
fn parse_feed(feed: &str) -> Vec<RawCandidate> {
    ENTRY
        .captures_iter(feed)
        .map(|caps| parse_entry(&caps[1]))
        .collect()
}

fn parse_entry(entry: &str) -> RawCandidate {
    let authors: Vec<String> = AUTHOR
        .captures_iter(entry)
        .map(|caps| collapse_whitespace(&unescape_xml(&caps[1])))
        .collect();
    let journal_ref = capture(&JOURNAL_REF, entry);
    let mut candidate = RawCandidate::new(Source::Arxiv)
        .with_authors(authors)
        .with_venue(journal_ref.as_deref().unwrap_or(ARXIV_VENUE))
        .with_extra("archiveprefix", "arXiv");
    if journal_ref.is_none() {
        candidate = candidate.with_entry_type_hint("preprint");
    }
    if let Some(title) = capture(&TITLE, entry) {
        candidate = candidate.with_title(clean_title(&title));
    }
    if let Some(year) = PUBLISHED
        .captures(entry)
        .and_then(|caps| caps[1].parse::<i32>().ok())
    {
        candidate = candidate.with_year(year);
    }
    if let Some(doi) = capture(&DOI, entry) {
        candidate = candidate.with_doi(doi);
    }
    if let Some(id) = capture(&ID, entry).and_then(|id| find_arxiv_id(&id)) {
        candidate = candidate
            .with_extra("url", format!("https://arxiv.org/abs/{id}"))
            .with_extra("eprint", id);
    }
    if let Some(category) = capture(&PRIMARY_CATEGORY, entry) {
        candidate = candidate.with_extra("primaryclass", category);
    }
    candidate
}

/// arXiv `/api/query` collaborator.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    http: HttpFetcher,
    base_url: String,
}

impl ArxivSource {
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
impl SourceCollaborator for ArxivSource {
    fn source(&self) -> Source {
        Source::Arxiv
    }

    #[tracing::instrument(skip(self, hint), fields(source = "arxiv"))]
    async fn fetch(&self, hint: &WorkHint) -> Result<FetchOutcome, SourceError> {
        let Some(title) = hint.query_title() else {
            debug!("no title to search for");
            return Ok(FetchOutcome::NotFound);
        };
        let mut query = format!("ti:\"{}\"", title.replace('"', " "));
        if let Some(surname) = hint.first_author_surname() {
            query.push_str(&format!(" AND au:\"{surname}\""));
        }
        let max_results = (hint.max_candidates * 2).to_string();
        let url = with_query(
            &format!("{}/api/query", self.base_url),
            &[
                ("search_query", query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
            ],
        );

        let Some(feed) = self
            .http
            .get_text(Source::Arxiv, &url, Some("application/atom+xml"), &[])
            .await?
        else {
            return Ok(FetchOutcome::NotFound);
        };
        Ok(FetchOutcome::ranked(parse_feed(&feed), hint))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=ti:"Deep Learning for X"</title>
  <entry>
    <id>http://arxiv.org/abs/2301.01234v2</id>
    <published>2023-01-03T18:00:00Z</published>
    <title>Deep Learning
      for X</title>
    <author><name>Jane Doe</name></author>
    <author><name>Rui Li &amp; Co</name></author>
    <arxiv:doi xmlns:arxiv="http://arxiv.org/schemas/atom">10.1000/abc</arxiv:doi>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2201.00001v1</id>
    <published>2022-01-01T00:00:00Z</published>
    <title>Other Work</title>
    <author><name>A. Nother</name></author>
    <arxiv:journal_ref xmlns:arxiv="http://arxiv.org/schemas/atom">Phys. Rev. D 1 (2022)</arxiv:journal_ref>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed_reads_entries() {
        let entries = parse_feed(FEED);
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title.as_deref(), Some("Deep Learning for X"));
        assert_eq!(first.authors, vec!["Jane Doe", "Rui Li & Co"]);
        assert_eq!(first.year, Some(2023));
        assert_eq!(first.venue.as_deref(), Some(ARXIV_VENUE));
        assert_eq!(first.doi.as_deref(), Some("10.1000/abc"));
        assert_eq!(first.extras.get("eprint").map(String::as_str), Some("2301.01234"));
        assert_eq!(first.extras.get("primaryclass").map(String::as_str), Some("cs.LG"));
        assert_eq!(
            first.extras.get("url").map(String::as_str),
            Some("https://arxiv.org/abs/2301.01234")
        );

        let second = &entries[1];
        assert_eq!(second.venue.as_deref(), Some("Phys. Rev. D 1 (2022)"));
        assert_eq!(second.doi, None);
        assert_eq!(second.entry_type_hint, None);
    }

    #[tokio::test]
    async fn test_fetch_ranks_feed_entries() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "ti:\"Other Work\""))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let source = ArxivSource::with_base_url(HttpFetcher::unthrottled().unwrap(), server.uri());
        let hint = WorkHint::from_baseline(
            &RawCandidate::new(Source::ScholarBaseline).with_title("Other Work"),
            1,
        );
        let FetchOutcome::Candidates(candidates) = source.fetch(&hint).await.unwrap() else {
            panic!("expected candidates");
        };
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title.as_deref(), Some("Other Work"));
    }

    #[test]
    fn test_empty_feed_has_no_entries() {
        assert!(parse_feed("<feed></feed>").is_empty());
    }
}
