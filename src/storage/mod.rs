//! Persistence of merged records.
//!
//! The pipeline only sees [`RecordStore`]; [`BibtexStore`] is the
//! filesystem implementation used by the CLI.

mod bibtex_store;
mod error;
mod naming;
mod shortener;
mod writer;

use std::path::{Path, PathBuf};

use crate::author::AuthorRecord;
use crate::record::{CanonicalRecord, RawCandidate};

pub use bibtex_store::BibtexStore;
pub use error::StorageError;
pub use naming::{author_dirname, bib_filename, citekey, key_stem};
pub use shortener::{SignificantWords, TitleShortener};
pub use writer::render_bibtex;

/// A record found on disk from an earlier run.
#[derive(Debug, Clone)]
pub struct SavedRecord {
    pub path: PathBuf,
    pub candidate: RawCandidate,
}

/// Where merged records go and where earlier ones are found.
pub trait RecordStore: Send + Sync {
    /// Records already saved for `author`; an author never seen yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadDir`] when the author's directory exists but
    /// cannot be listed.
    fn saved_records(&self, author: &AuthorRecord) -> Result<Vec<SavedRecord>, StorageError>;

    /// Saves `record` and returns its path. When `preferred` names the file the
    /// record was loaded from, that file is overwritten or replaced.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the directory or file cannot be written.
    fn save(
        &self,
        author: &AuthorRecord,
        record: &CanonicalRecord,
        preferred: Option<&Path>,
    ) -> Result<PathBuf, StorageError>;
}
