//! API key loading from key files or environment variables.

use std::fs;
use std::path::Path;

use tracing::debug;

/// Credentials for sources that need them. Missing values disable those sources.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    pub serpapi: Option<String>,
    pub semantic_scholar: Option<String>,
    /// Contact address sent to Crossref and OpenAlex.
    pub mailto: Option<String>,
    /// Optional OpenReview login; searches run anonymously without it.
    pub openreview: Option<OpenReviewCredentials>,
}

/// OpenReview username and password.
#[derive(Clone, PartialEq, Eq)]
pub struct OpenReviewCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for OpenReviewCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenReviewCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("serpapi", &self.serpapi.as_ref().map(|_| "<redacted>"))
            .field(
                "semantic_scholar",
                &self.semantic_scholar.as_ref().map(|_| "<redacted>"),
            )
            .field("mailto", &self.mailto)
            .field("openreview", &self.openreview)
            .finish()
    }
}

impl ApiKeys {
    /// Reads `SerpAPI.key`, `Semantic.key`, `Email.key` and `OpenReview.key`
    /// from `keys_dir`; `SERPAPI_KEY`, `S2_API_KEY`, `CITEFORGE_MAILTO` and
    /// `OPENREVIEW_USERNAME` with `OPENREVIEW_PASSWORD` take precedence.
    #[must_use]
    pub fn load(keys_dir: &Path) -> Self {
        let openreview = match (
            env_value("OPENREVIEW_USERNAME"),
            env_value("OPENREVIEW_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(OpenReviewCredentials { username, password }),
            _ => read_credentials_file(&keys_dir.join("OpenReview.key")),
        };
        Self {
            serpapi: env_value("SERPAPI_KEY")
                .or_else(|| read_key_file(&keys_dir.join("SerpAPI.key"))),
            semantic_scholar: env_value("S2_API_KEY")
                .or_else(|| read_key_file(&keys_dir.join("Semantic.key"))),
            mailto: env_value("CITEFORGE_MAILTO")
                .or_else(|| read_key_file(&keys_dir.join("Email.key"))),
            openreview,
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Non-empty trimmed lines of a key file.
fn key_file_lines(path: &Path) -> Option<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Some(
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "key file not readable");
            None
        }
    }
}

/// First non-empty line of a key file.
fn read_key_file(path: &Path) -> Option<String> {
    key_file_lines(path)?.into_iter().next()
}

/// Username on the first non-empty line, password on the second.
fn read_credentials_file(path: &Path) -> Option<OpenReviewCredentials> {
    let mut lines = key_file_lines(path)?.into_iter();
    match (lines.next(), lines.next()) {
        (Some(username), Some(password)) => Some(OpenReviewCredentials { username, password }),
        _ => {
            debug!(path = %path.display(), "credentials file needs a username and a password line");
            None
        }
    }
}
