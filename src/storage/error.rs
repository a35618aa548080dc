use std::path::PathBuf;

use thiserror::Error;

/// Errors writing or reading saved records.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(
        "cannot create output directory {path}: {source}\n  Suggestion: check that the output directory is writable"
    )]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write record {path}: {source}\n  Suggestion: check free disk space and permissions")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot list saved records in {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
