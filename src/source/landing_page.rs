//! Landing-page scraping for late DOI discovery.

use async_trait::async_trait;

use super::{HttpFetcher, PageFetcher, SourceError};
use crate::parser::find_doi_in_html;
use crate::record::Source;

/// Fetches a page and looks for a DOI in its bibliographic meta tags or body.
#[derive(Debug, Clone)]
pub struct LandingPageFetcher {
    http: HttpFetcher,
}

impl LandingPageFetcher {
    #[must_use]
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PageFetcher for LandingPageFetcher {
    #[tracing::instrument(skip(self))]
    async fn find_doi(&self, url: &str) -> Result<Option<String>, SourceError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Ok(None);
        }
        // Pages are not a trust tier of their own; errors are attributed to the resolver tier.
        let html = self
            .http
            .get_text(Source::Csl, url, Some("text/html"), &[])
            .await?;
        Ok(html.as_deref().and_then(find_doi_in_html))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn test_find_doi_in_meta_tag() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/paper"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><meta name="citation_doi" content="10.1145/3292500.3330701"></head></html>"#,
            ))
            .mount(&server)
            .await;

        let fetcher = LandingPageFetcher::new(HttpFetcher::unthrottled().unwrap());
        let doi = fetcher
            .find_doi(&format!("{}/paper", server.uri()))
            .await
            .unwrap();
        assert_eq!(doi.as_deref(), Some("10.1145/3292500.3330701"));
    }

    #[tokio::test]
    async fn test_missing_page_has_no_doi() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = LandingPageFetcher::new(HttpFetcher::unthrottled().unwrap());
        assert!(
            fetcher
                .find_doi(&format!("{}/gone", server.uri()))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_non_http_url_is_ignored() {
        let fetcher = LandingPageFetcher::new(HttpFetcher::unthrottled().unwrap());
        assert!(fetcher.find_doi("ftp://example.org/x").await.unwrap().is_none());
    }
}
