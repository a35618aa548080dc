//! In-memory collaborators for pipeline and coordinator tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::author::AuthorRecord;
use crate::record::{CanonicalRecord, RawCandidate, Source};
use crate::source::{
    DiscoverySource, DoiResolution, DoiResolver, FetchOutcome, PageFetcher, SourceCollaborator,
    SourceError, WorkHint,
};
use crate::storage::{RecordStore, SavedRecord, StorageError};

/// Source returning a fixed outcome, or failing with HTTP 503.
pub struct MockSource {
    source: Source,
    outcome: Option<FetchOutcome>,
    expensive: bool,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn returning(candidate: RawCandidate) -> Self {
        Self {
            source: candidate.source,
            outcome: Some(FetchOutcome::Candidates(vec![candidate])),
            expensive: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ranked(source: Source, candidates: Vec<RawCandidate>) -> Self {
        Self {
            source,
            outcome: Some(FetchOutcome::Candidates(candidates)),
            expensive: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn not_found(source: Source) -> Self {
        Self {
            source,
            outcome: Some(FetchOutcome::NotFound),
            expensive: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(source: Source) -> Self {
        Self {
            source,
            outcome: None,
            expensive: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn expensive(mut self) -> Self {
        self.expensive = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceCollaborator for MockSource {
    fn source(&self) -> Source {
        self.source
    }

    fn is_expensive(&self) -> bool {
        self.expensive
    }

    async fn fetch(&self, _hint: &WorkHint) -> Result<FetchOutcome, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .clone()
            .ok_or_else(|| SourceError::http_status(self.source, "mock://source", 503))
    }
}

/// Resolver answering from a DOI table; unknown DOIs are not found.
#[derive(Default)]
pub struct MockResolver {
    answers: BTreeMap<String, DoiResolution>,
    failing: bool,
    calls: Mutex<Vec<String>>,
}

impl MockResolver {
    pub fn with(mut self, doi: &str, resolution: DoiResolution) -> Self {
        self.answers.insert(doi.to_string(), resolution);
        self
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DoiResolver for MockResolver {
    async fn resolve(&self, doi: &str) -> Result<DoiResolution, SourceError> {
        self.calls.lock().unwrap().push(doi.to_string());
        if self.failing {
            return Err(SourceError::http_status(Source::Csl, "mock://doi", 503));
        }
        Ok(self
            .answers
            .get(doi)
            .cloned()
            .unwrap_or(DoiResolution::NotFound))
    }
}

/// Page fetcher answering from a URL table.
#[derive(Default)]
pub struct MockPages {
    pages: BTreeMap<String, String>,
}

impl MockPages {
    pub fn with(mut self, url: &str, doi: &str) -> Self {
        self.pages.insert(url.to_string(), doi.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for MockPages {
    async fn find_doi(&self, url: &str) -> Result<Option<String>, SourceError> {
        Ok(self.pages.get(url).cloned())
    }
}

/// Discovery source with a fixed listing, or failing when `None`.
pub struct MockDiscovery {
    name: &'static str,
    works: Option<Vec<RawCandidate>>,
    panics_for: Option<&'static str>,
}

impl MockDiscovery {
    pub fn listing(name: &'static str, works: Vec<RawCandidate>) -> Self {
        Self {
            name,
            works: Some(works),
            panics_for: None,
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            works: None,
            panics_for: None,
        }
    }

    /// Panics instead of listing when asked about `author`.
    pub fn panicking_for(mut self, author: &'static str) -> Self {
        self.panics_for = Some(author);
        self
    }
}

#[async_trait]
impl DiscoverySource for MockDiscovery {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn list_works(
        &self,
        author: &AuthorRecord,
        limit: usize,
    ) -> Result<Option<Vec<RawCandidate>>, SourceError> {
        if self.panics_for == Some(author.name.as_str()) {
            panic!("listing for {} blew up", author.name);
        }
        match &self.works {
            Some(works) => Ok(Some(works.iter().take(limit).cloned().collect())),
            None => Err(SourceError::Discovery {
                name: self.name,
                message: "listing unavailable".to_string(),
            }),
        }
    }
}

/// Store keeping saved records in memory.
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<(String, PathBuf, CanonicalRecord)>>,
    seeds: Vec<SavedRecord>,
}

impl MemoryStore {
    pub fn with_saved(mut self, path: &str, candidate: RawCandidate) -> Self {
        self.seeds.push(SavedRecord {
            path: PathBuf::from(path),
            candidate,
        });
        self
    }

    pub fn records(&self) -> Vec<CanonicalRecord> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, record)| record.clone())
            .collect()
    }
}

impl RecordStore for MemoryStore {
    fn saved_records(&self, _author: &AuthorRecord) -> Result<Vec<SavedRecord>, StorageError> {
        Ok(self.seeds.clone())
    }

    fn save(
        &self,
        author: &AuthorRecord,
        record: &CanonicalRecord,
        preferred: Option<&Path>,
    ) -> Result<PathBuf, StorageError> {
        let mut saved = self.saved.lock().unwrap();
        let path = preferred.map_or_else(
            || PathBuf::from(format!("{}/{}.bib", author.name, saved.len())),
            Path::to_path_buf,
        );
        saved.push((author.name.clone(), path.clone(), record.clone()));
        Ok(path)
    }
}
