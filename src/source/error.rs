//! Error type for source collaborators.
//!
//! A `SourceError` never aborts an article: the pipeline logs it at warn
//! level and treats the source as having returned nothing.

use std::time::Duration;

use thiserror::Error;

use crate::record::Source;

/// Failure of one collaborator call.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection, DNS or TLS failure.
    #[error("[{origin}] network error calling {url}: {error}")]
    Network {
        origin: Source,
        url: String,
        #[source]
        error: reqwest::Error,
    },

    /// Non-success HTTP status other than 404.
    #[error("[{origin}] HTTP {status} from {url}")]
    HttpStatus {
        origin: Source,
        url: String,
        status: u16,
        /// Raw Retry-After header, when the server sent one.
        retry_after: Option<String>,
    },

    /// The call did not finish within its per-call budget.
    #[error("[{origin}] timed out after {}ms", after.as_millis())]
    Timeout { origin: Source, after: Duration },

    /// The response arrived but could not be understood.
    #[error("[{origin}] unexpected response from {url}: {message}")]
    Parse {
        origin: Source,
        url: String,
        message: String,
    },

    /// A required API key was not configured.
    #[error(
        "[{origin}] missing API key `{key}`\n  Suggestion: put the key in {key} under --keys-dir or set the {env} environment variable"
    )]
    MissingKey {
        origin: Source,
        key: &'static str,
        env: &'static str,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}\n  Suggestion: check proxy environment variables")]
    ClientBuild(#[source] reqwest::Error),

    /// A discovery listing could not be used.
    #[error("discovery via {name} failed: {message}")]
    Discovery { name: &'static str, message: String },
}

impl SourceError {
    pub fn network(origin: Source, url: impl Into<String>, error: reqwest::Error) -> Self {
        Self::Network {
            origin,
            url: url.into(),
            error,
        }
    }

    pub fn http_status(origin: Source, url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            origin,
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    pub fn parse(origin: Source, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            origin,
            url: url.into(),
            message: message.into(),
        }
    }

    /// Source the failure is attributed to, if any.
    #[must_use]
    pub fn origin(&self) -> Option<Source> {
        match self {
            Self::Network { origin, .. }
            | Self::HttpStatus { origin, .. }
            | Self::Timeout { origin, .. }
            | Self::Parse { origin, .. }
            | Self::MissingKey { origin, .. } => Some(*origin),
            Self::ClientBuild(_) | Self::Discovery { .. } => None,
        }
    }
}
