//! Coverage reporting: one summary row per saved record.
//!
//! The pipeline does not format reports. The run collector hands each
//! [`SummaryRow`] to a [`ReportSink`]; [`SummaryCsvWriter`] is the CSV sink
//! used by the CLI.

mod summary;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::author::AuthorRecord;
use crate::record::{CanonicalRecord, Source};

pub use summary::SummaryCsvWriter;

/// Coverage of one saved record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub file_path: String,
    pub author: String,
    pub trust_hits: usize,
    /// Validated sources counted in `trust_hits`.
    pub sources: BTreeSet<Source>,
}

impl SummaryRow {
    #[must_use]
    pub fn from_record(author: &AuthorRecord, path: &Path, record: &CanonicalRecord) -> Self {
        Self {
            file_path: path.display().to_string(),
            author: author.name.clone(),
            trust_hits: record.trust_hits(),
            sources: record.validated_sources().clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot write summary {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed summary {path}: {source}\n  Suggestion: move the old summary file aside")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Receives summary rows as records are saved.
pub trait ReportSink: Send {
    /// # Errors
    ///
    /// Returns [`ReportError`] when the row cannot be persisted.
    fn record(&mut self, row: SummaryRow) -> Result<(), ReportError>;

    /// Called once after the last row.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when buffered rows cannot be persisted.
    fn finish(&mut self) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Sink that keeps rows in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub rows: Vec<SummaryRow>,
}

impl ReportSink for MemorySink {
    fn record(&mut self, row: SummaryRow) -> Result<(), ReportError> {
        self.rows.push(row);
        Ok(())
    }
}
