//! Author input records read from the CSV roster.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// One author to process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorRecord {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Email")]
    pub email: String,
    /// Google Scholar profile id.
    #[serde(default, alias = "Scholar", alias = "scholar")]
    pub scholar_id: String,
    #[serde(default, alias = "ORCID")]
    pub orcid: String,
    /// DBLP person name or key used for the directory search.
    #[serde(default, alias = "DBLP")]
    pub dblp: String,
    /// Publication count known up front; only used to schedule big authors first.
    #[serde(default, alias = "publications", alias = "Publications")]
    pub known_publications: Option<u32>,
}

impl AuthorRecord {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: String::new(),
            scholar_id: String::new(),
            orcid: String::new(),
            dblp: String::new(),
            known_publications: None,
        }
    }

    #[must_use]
    pub fn with_scholar_id(mut self, scholar_id: impl Into<String>) -> Self {
        self.scholar_id = scholar_id.into();
        self
    }

    #[must_use]
    pub fn with_dblp(mut self, dblp: impl Into<String>) -> Self {
        self.dblp = dblp.into();
        self
    }

    #[must_use]
    pub fn with_known_publications(mut self, count: u32) -> Self {
        self.known_publications = Some(count);
        self
    }

    /// Stable id used in directory names: Scholar id, else ORCID, else DBLP.
    #[must_use]
    pub fn id(&self) -> &str {
        [&self.scholar_id, &self.orcid, &self.dblp]
            .into_iter()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .unwrap_or("noid")
    }

    /// Whether any discovery source can list this author's works.
    #[must_use]
    pub fn has_discovery_id(&self) -> bool {
        !self.scholar_id.trim().is_empty() || !self.dblp.trim().is_empty()
    }

    fn trimmed(mut self) -> Self {
        for field in [
            &mut self.name,
            &mut self.email,
            &mut self.scholar_id,
            &mut self.orcid,
            &mut self.dblp,
        ] {
            *field = field.trim().to_string();
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum AuthorInputError {
    #[error("cannot read author list {path}: {source}\n  Suggestion: pass --input <file.csv>")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed author list {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(
        "no usable authors in {path}\n  Suggestion: every row needs a name and a Scholar id or DBLP name"
    )]
    Empty { path: PathBuf },
}

/// Reads the author roster; blank rows and rows without a discovery id are skipped.
///
/// # Errors
///
/// Returns [`AuthorInputError`] when the file cannot be read or parsed, or
/// when no usable row remains.
pub fn read_authors(path: &Path) -> Result<Vec<AuthorRecord>, AuthorInputError> {
    let file = File::open(path).map_err(|source| AuthorInputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let mut authors = Vec::new();
    for row in reader.deserialize::<AuthorRecord>() {
        let author = row
            .map_err(|source| AuthorInputError::Csv {
                path: path.to_path_buf(),
                source,
            })?
            .trimmed();
        if author.name.is_empty() {
            debug!("skipping row without a name");
            continue;
        }
        if !author.has_discovery_id() {
            warn!(author = %author.name, "skipping author without Scholar id or DBLP name");
            continue;
        }
        authors.push(author);
    }

    if authors.is_empty() {
        return Err(AuthorInputError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(authors)
}
