//! Author-level failures.

use thiserror::Error;

/// Failure that ends one author. Other authors continue.
#[derive(Debug, Error)]
pub enum AuthorError {
    /// No discovery source knows an id for the author.
    #[error(
        "no discovery source can list works for {author}\n  Suggestion: add a Scholar id (needs a SerpAPI key) or a DBLP name"
    )]
    NoDiscoveryId { author: String },

    /// Every discovery source that was tried failed.
    #[error("could not list works for {author}: {message}")]
    DiscoveryFailed { author: String, message: String },

    /// The author's task ended without a result.
    #[error("processing {author} aborted: {message}")]
    Aborted { author: String, message: String },
}

impl AuthorError {
    /// Short machine-friendly label used in reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoDiscoveryId { .. } => "no_discovery_id",
            Self::DiscoveryFailed { .. } => "discovery_failed",
            Self::Aborted { .. } => "aborted",
        }
    }
}

/// Failure of the run machinery itself, not of any author.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("report collector stopped unexpectedly: {0}")]
    Collector(#[from] tokio::task::JoinError),
}
