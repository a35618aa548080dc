//! OpenReview notes search.
//!
//! Notes come from `/notes?term=`; when that finds nothing the full-text
//! `/notes/search?q=` endpoint is tried. API v2 wraps every content field in
//! `{"value": ...}`, v1 does not; both shapes are accepted.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{FetchOutcome, HttpFetcher, SourceCollaborator, SourceError, WorkHint, with_query};
use crate::config::OpenReviewCredentials;
use crate::record::{RawCandidate, Source};
use crate::text::clean_title;

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.openreview.net";

/// Public forum page of a note.
const FORUM_URL: &str = "https://openreview.net/forum?id=";

/// Page size of the full-text fallback search.
const SEARCH_LIMIT: &str = "20";

#[derive(Debug, Deserialize)]
struct NotesResponse {
    #[serde(default, alias = "data")]
    notes: Vec<Note>,
}

#[derive(Debug, Deserialize)]
struct Note {
    id: Option<String>,
    forum: Option<String>,
    #[serde(default)]
    content: NoteContent,
    /// Publication, creation and true-creation dates, epoch milliseconds.
    pdate: Option<i64>,
    cdate: Option<i64>,
    tcdate: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct NoteContent {
    title: Option<Wrapped<String>>,
    authors: Option<Wrapped<Vec<String>>>,
    authorids: Option<Wrapped<Vec<String>>>,
    venue: Option<Wrapped<String>>,
    venueid: Option<Wrapped<String>>,
    doi: Option<Wrapped<String>>,
    html: Option<Wrapped<String>>,
}

/// A content field, bare (API v1) or as `{"value": ...}` (API v2).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Wrapped<T> {
    Value { value: T },
    Plain(T),
}

impl<T> Wrapped<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Value { value } | Self::Plain(value) => value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

impl Note {
    fn year(&self) -> Option<i32> {
        [self.pdate, self.cdate, self.tcdate]
            .into_iter()
            .flatten()
            .find_map(DateTime::<Utc>::from_timestamp_millis)
            .map(|date| date.year())
    }

    fn into_candidate(self) -> RawCandidate {
        let year = self.year();
        let content = self.content;
        let authors = content
            .authors
            .or(content.authorids)
            .map(Wrapped::into_inner)
            .unwrap_or_default()
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && !name.starts_with('~'));
        let mut candidate = RawCandidate::new(Source::Openreview)
            .with_authors(authors)
            .with_entry_type_hint("conference");
        if let Some(title) = content.title.map(Wrapped::into_inner) {
            candidate = candidate.with_title(clean_title(&title));
        }
        if let Some(year) = year {
            candidate = candidate.with_year(year);
        }
        if let Some(venue) = content.venue.or(content.venueid).map(Wrapped::into_inner) {
            candidate = candidate.with_venue(venue);
        }
        if let Some(doi) = content.doi.map(Wrapped::into_inner) {
            candidate = candidate.with_doi(doi);
        }
        let landing = content
            .html
            .map(Wrapped::into_inner)
            .or_else(|| self.forum.or(self.id).map(|id| format!("{FORUM_URL}{id}")));
        if let Some(landing) = landing {
            candidate = candidate.with_extra(super::LANDING_URL_KEY, landing);
        }
        candidate
    }
}

/// OpenReview notes search; logs in once when credentials are configured.
pub struct OpenReviewSource {
    http: HttpFetcher,
    base_url: String,
    credentials: Option<OpenReviewCredentials>,
    token: OnceCell<Option<String>>,
}

impl std::fmt::Debug for OpenReviewSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenReviewSource")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl OpenReviewSource {
    #[must_use]
    pub fn new(http: HttpFetcher, credentials: Option<OpenReviewCredentials>) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL, credentials)
    }

    #[must_use]
    pub fn with_base_url(
        http: HttpFetcher,
        base_url: impl Into<String>,
        credentials: Option<OpenReviewCredentials>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credentials,
            token: OnceCell::new(),
        }
    }

    /// Session token, fetched on first use. A failed login falls back to
    /// anonymous access for the rest of the run.
    async fn token(&self) -> Option<&str> {
        self.token
            .get_or_init(|| async {
                let Some(credentials) = self.credentials.as_ref() else {
                    return None;
                };
                let url = format!("{}/login", self.base_url);
                let body = serde_json::json!({
                    "id": credentials.username,
                    "password": credentials.password,
                });
                match self
                    .http
                    .post_json::<LoginResponse>(Source::Openreview, &url, &body)
                    .await
                {
                    Ok(Some(LoginResponse { token: Some(token) })) => Some(token),
                    Ok(_) => {
                        warn!("OpenReview login returned no token; searching anonymously");
                        None
                    }
                    Err(error) => {
                        warn!(error = %error, "OpenReview login failed; searching anonymously");
                        None
                    }
                }
            })
            .await
            .as_deref()
    }

    async fn notes(&self, url: &str, auth: Option<&str>) -> Result<Vec<Note>, SourceError> {
        let headers: Vec<(&'static str, &str)> =
            auth.map(|value| ("authorization", value)).into_iter().collect();
        Ok(self
            .http
            .get_json::<NotesResponse>(Source::Openreview, url, &headers)
            .await?
            .map(|response| response.notes)
            .unwrap_or_default())
    }
}

#[async_trait]
impl SourceCollaborator for OpenReviewSource {
    fn source(&self) -> Source {
        Source::Openreview
    }

    #[tracing::instrument(skip(self, hint), fields(source = "openreview"))]
    async fn fetch(&self, hint: &WorkHint) -> Result<FetchOutcome, SourceError> {
        let Some(title) = hint.query_title() else {
            debug!("no title to search for");
            return Ok(FetchOutcome::NotFound);
        };
        let auth = self.token().await.map(|token| format!("Bearer {token}"));

        let url = with_query(
            &format!("{}/notes", self.base_url),
            &[("term", title.as_str()), ("details", "metadata")],
        );
        let mut notes = self.notes(&url, auth.as_deref()).await?;
        if notes.is_empty() {
            let url = with_query(
                &format!("{}/notes/search", self.base_url),
                &[("q", title.as_str()), ("limit", SEARCH_LIMIT)],
            );
            notes = self.notes(&url, auth.as_deref()).await?;
        }

        let candidates = notes.into_iter().map(Note::into_candidate).collect();
        Ok(FetchOutcome::ranked(candidates, hint))
    }
}
