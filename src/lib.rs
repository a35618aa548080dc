//! Citeforge Core Library
//!
//! Builds one canonical bibliographic record per publication for a list of
//! authors by querying many unreliable sources and merging what they agree on.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`record`] - Sources, trust order, raw candidates and canonical records
//! - [`matching`] - Similarity scoring and candidate validation
//! - [`merge`] - Trust-hierarchy merge of accepted candidates
//! - [`pipeline`] - Four-phase per-article enrichment
//! - [`coordinator`] - Per-author discovery, dedup and the author worker pool
//! - [`source`] - HTTP collaborators (Crossref, OpenAlex, arXiv, DOI resolver, ...)
//! - [`storage`] - BibTeX rendering, file naming and saved-record reuse
//! - [`report`] - The `summary.csv` provenance report
//! - [`config`] - TOML engine configuration and API keys
//! - [`author`] - Author list input
//! - [`parser`] - DOI/arXiv extraction and BibTeX parsing
//! - [`text`] - Title and name normalization

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod author;
pub mod config;
pub mod coordinator;
pub mod matching;
pub mod merge;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod source;
pub mod storage;
pub mod text;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use author::{AuthorInputError, AuthorRecord, read_authors};
pub use config::{ApiKeys, ConfigError, EngineConfig, LoadedConfig, load_config};
pub use coordinator::{AuthorBatchCoordinator, AuthorError, AuthorReport, RunCoordinator, RunReport};
pub use matching::{CandidateValidator, SimilarityScorer, Verdict};
pub use merge::TrustMergeEngine;
pub use pipeline::{ArticleError, ArticlePipeline, ArticleReport};
pub use record::{CanonicalRecord, EntryType, RawCandidate, Source, TrustOrder};
pub use report::{ReportSink, SummaryCsvWriter, SummaryRow};
pub use source::{RetryPolicy, SourceError, SourceRegistry};
pub use storage::{BibtexStore, RecordStore, StorageError};
