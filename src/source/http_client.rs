//! Shared HTTP client policy and request helpers for source collaborators.
//!
//! Every source goes through [`HttpFetcher`], so timeouts, the user agent,
//! per-host rate limiting and status handling stay consistent.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::SourceError;
use super::rate_limiter::{RateLimiter, parse_retry_after};
use crate::record::Source;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 30;

/// Project URL sent in the User-Agent.
const PROJECT_URL: &str = "https://github.com/fierce/citeforge";

/// User-Agent for all source traffic; carries the contact address when known.
#[must_use]
pub fn default_user_agent(mailto: Option<&str>) -> String {
    let version = env!("CARGO_PKG_VERSION");
    match mailto {
        Some(mailto) => format!("citeforge/{version} (+{PROJECT_URL}; mailto:{mailto})"),
        None => format!("citeforge/{version} (+{PROJECT_URL})"),
    }
}

/// Builds the shared HTTP client.
///
/// # Errors
///
/// Returns [`SourceError::ClientBuild`] when reqwest cannot build a client.
pub fn build_http_client(user_agent: &str) -> Result<Client, SourceError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
        .user_agent(user_agent)
        .gzip(true)
        .build()
        .map_err(SourceError::ClientBuild)
}

/// Rate-limited GET helper shared by sources.
///
/// A 404 becomes `Ok(None)` so sources can report "no match" without an error.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl HttpFetcher {
    #[must_use]
    pub fn new(client: Client, limiter: Arc<RateLimiter>) -> Self {
        Self { client, limiter }
    }

    /// Fetcher with a default client and no rate limiting; used in tests.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::ClientBuild`] when the client cannot be built.
    pub fn unthrottled() -> Result<Self, SourceError> {
        Ok(Self::new(
            build_http_client(&default_user_agent(None))?,
            Arc::new(RateLimiter::disabled()),
        ))
    }

    /// GET returning the body text, `None` on 404.
    /// `extra_headers` names must be lowercase.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on network failures and non-success statuses.
    pub async fn get_text(
        &self,
        origin: Source,
        url: &str,
        accept: Option<&str>,
        extra_headers: &[(&'static str, &str)],
    ) -> Result<Option<String>, SourceError> {
        self.limiter.acquire(url).await;

        let mut headers = HeaderMap::new();
        if let Some(accept) = accept
            && let Ok(value) = HeaderValue::from_str(accept)
        {
            headers.insert(ACCEPT, value);
        }
        for (name, value) in extra_headers {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(*name), value);
            }
        }

        debug!(source = %origin, url, "calling source");
        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|error| SourceError::network(origin, url, error))?;

        self.read_body(origin, url, response).await
    }

    /// POST a JSON body and deserialize the JSON answer, `None` on 404.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on network failures, non-success statuses and
    /// bodies that do not match `T`.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        origin: Source,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Option<T>, SourceError> {
        self.limiter.acquire(url).await;

        debug!(source = %origin, url, "posting to source");
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|error| SourceError::network(origin, url, error))?;

        let Some(text) = self.read_body(origin, url, response).await? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|error| SourceError::parse(origin, url, error.to_string()))
    }

    /// Maps 404 to `None` and other failures to [`SourceError::HttpStatus`],
    /// recording any Retry-After on 429.
    async fn read_body(
        &self,
        origin: Source,
        url: &str,
        response: reqwest::Response,
    ) -> Result<Option<String>, SourceError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            if status == StatusCode::TOO_MANY_REQUESTS
                && let Some(delay) = retry_after.as_deref().and_then(parse_retry_after)
            {
                self.limiter.record_rate_limit(url, delay).await;
            }
            return Err(SourceError::HttpStatus {
                origin,
                url: url.to_string(),
                status: status.as_u16(),
                retry_after,
            });
        }

        response
            .text()
            .await
            .map(Some)
            .map_err(|error| SourceError::network(origin, url, error))
    }

    /// GET and deserialize a JSON body, `None` on 404.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Parse`] when the body does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        origin: Source,
        url: &str,
        extra_headers: &[(&'static str, &str)],
    ) -> Result<Option<T>, SourceError> {
        let Some(body) = self
            .get_text(origin, url, Some("application/json"), extra_headers)
            .await?
        else {
            return Ok(None);
        };
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|error| SourceError::parse(origin, url, error.to_string()))
    }
}
