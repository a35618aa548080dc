//! Article-level failures.

use thiserror::Error;

use crate::storage::StorageError;

/// Failure that ends one article. Other articles of the author continue.
#[derive(Debug, Error)]
pub enum ArticleError {
    /// The discovered work carries neither a title nor a DOI.
    #[error(
        "work listed by {origin} has neither title nor DOI; skipped\n  Suggestion: check the author's profile entry for this work"
    )]
    InsufficientBaseline { origin: crate::record::Source },

    /// The merged record could not be written.
    #[error("failed to save \"{title}\": {error}")]
    Storage {
        title: String,
        #[source]
        error: StorageError,
    },
}

impl ArticleError {
    /// Short machine-friendly label used in reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientBaseline { .. } => "insufficient_baseline",
            Self::Storage { .. } => "storage",
        }
    }
}
