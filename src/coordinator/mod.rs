//! Per-author batch processing and the author worker pool.
//!
//! [`AuthorBatchCoordinator`] lists an author's works, deduplicates them,
//! picks seeds and runs the article pipeline once per distinct work.
//! [`RunCoordinator`] runs many authors concurrently.

mod dedup;
mod error;
mod events;
mod run;

use std::time::Duration;

use chrono::Datelike;
use tracing::{debug, info, instrument, warn};

use crate::author::AuthorRecord;
use crate::config::{DiscoveryConfig, EngineConfig};
use crate::matching::SimilarityScorer;
use crate::pipeline::{ArticlePipeline, ArticleReport, WorkSeed};
use crate::record::{CanonicalRecord, RawCandidate};
use crate::report::SummaryRow;
use crate::storage::SavedRecord;
use crate::text::title_similarity;

pub use dedup::{WindowSplit, fill_missing, merge_listings, order_works, within_window};
pub use error::{AuthorError, RunError};
pub use events::{CollectorOutcome, EventSender, RunEvent, spawn_collector};
pub use run::{AuthorOutcome, RunCoordinator, RunReport};

/// A listed work that produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedWork {
    pub title: String,
    pub kind: &'static str,
    pub reason: String,
}

/// Everything one author's run produced.
#[derive(Debug, Clone, Default)]
pub struct AuthorReport {
    pub author: String,
    /// Distinct works after merging all listings.
    pub listed: usize,
    pub yearless: usize,
    pub outside_window: usize,
    /// Works beyond the per-author cap.
    pub truncated: usize,
    pub reused: usize,
    pub saved: Vec<ArticleReport>,
    pub skipped: Vec<SkippedWork>,
    /// Discovery sources that failed while another one succeeded.
    pub discovery_failures: Vec<String>,
}

impl AuthorReport {
    pub fn records(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.saved.iter().map(|report| &report.record)
    }
}

/// Runs one author end to end.
#[derive(Debug, Clone)]
pub struct AuthorBatchCoordinator {
    pipeline: ArticlePipeline,
    scorer: SimilarityScorer,
    discovery: DiscoveryConfig,
    article_delay: Duration,
    current_year: i32,
}

impl AuthorBatchCoordinator {
    #[must_use]
    pub fn new(config: &EngineConfig, pipeline: ArticlePipeline) -> Self {
        Self {
            pipeline,
            scorer: SimilarityScorer::new(config.similarity),
            discovery: config.discovery,
            article_delay: config.concurrency.article_delay(),
            current_year: chrono::Local::now().year(),
        }
    }

    /// Pins the year the contribution window ends at.
    #[must_use]
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    #[must_use]
    pub fn pipeline(&self) -> &ArticlePipeline {
        &self.pipeline
    }

    /// Lists, deduplicates and enriches every work of `author` in the window.
    ///
    /// Article failures are recorded in the report; only discovery failures
    /// end the author.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorError::NoDiscoveryId`] when no discovery source knows
    /// the author and [`AuthorError::DiscoveryFailed`] when every source that
    /// was tried failed.
    #[instrument(skip_all, fields(author = %author.name))]
    pub async fn process(
        &self,
        author: &AuthorRecord,
        events: &EventSender,
    ) -> Result<AuthorReport, AuthorError> {
        let mut report = AuthorReport {
            author: author.name.clone(),
            ..AuthorReport::default()
        };

        let listings = self.discover(author, &mut report).await?;
        let merged = merge_listings(listings, &self.scorer);
        report.listed = merged.len();

        let split = within_window(merged, self.discovery.min_year(self.current_year));
        report.yearless = split.yearless;
        report.outside_window = split.outside;
        let mut works = split.kept;
        order_works(&mut works, self.current_year);
        let cap = self.discovery.max_publications_per_author();
        if works.len() > cap {
            report.truncated = works.len() - cap;
            works.truncate(cap);
        }
        info!(
            listed = report.listed,
            in_window = works.len(),
            yearless = report.yearless,
            outside_window = report.outside_window,
            "works selected"
        );
        events.send(RunEvent::AuthorStarted {
            author: author.name.clone(),
            works: works.len(),
        });

        let seeds = self.seeds(author, works);
        report.reused = seeds.iter().filter(|seed| seed.is_reused()).count();

        for (index, seed) in seeds.iter().enumerate() {
            if index > 0 && !self.article_delay.is_zero() {
                tokio::time::sleep(self.article_delay).await;
            }
            match self.pipeline.run(author, seed).await {
                Ok(article) => {
                    events.send(RunEvent::ArticleSaved {
                        row: SummaryRow::from_record(author, &article.path, &article.record),
                    });
                    report.saved.push(article);
                }
                Err(error) => {
                    let title = seed.baseline.title.clone().unwrap_or_default();
                    warn!(title = %title, error = %error, "work skipped");
                    events.send(RunEvent::ArticleSkipped {
                        author: author.name.clone(),
                        title: title.clone(),
                        reason: error.to_string(),
                    });
                    report.skipped.push(SkippedWork {
                        title,
                        kind: error.kind(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        events.send(RunEvent::AuthorFinished {
            author: author.name.clone(),
            saved: report.saved.len(),
            skipped: report.skipped.len(),
        });
        Ok(report)
    }

    /// One listing per discovery source that knows the author, primary first.
    async fn discover(
        &self,
        author: &AuthorRecord,
        report: &mut AuthorReport,
    ) -> Result<Vec<Vec<RawCandidate>>, AuthorError> {
        let limit = self.discovery.max_publications_per_author();
        let mut listings = Vec::new();
        let mut failures = Vec::new();
        for discovery in self.pipeline.registry().discovery() {
            match discovery.list_works(author, limit).await {
                Ok(Some(works)) => {
                    debug!(source = discovery.name(), works = works.len(), "listing fetched");
                    listings.push(works);
                }
                Ok(None) => debug!(source = discovery.name(), "no id for this source"),
                Err(error) => {
                    warn!(source = discovery.name(), error = %error, "listing failed");
                    failures.push(error.to_string());
                }
            }
        }

        if listings.is_empty() {
            return Err(if failures.is_empty() {
                AuthorError::NoDiscoveryId {
                    author: author.name.clone(),
                }
            } else {
                AuthorError::DiscoveryFailed {
                    author: author.name.clone(),
                    message: failures.join("; "),
                }
            });
        }
        report.discovery_failures = failures;
        Ok(listings)
    }

    /// Pairs each work with a saved record of the same title, when reuse is on.
    fn seeds(&self, author: &AuthorRecord, works: Vec<RawCandidate>) -> Vec<WorkSeed> {
        let mut saved: Vec<Option<SavedRecord>> = if self.discovery.reuse_saved_records {
            match self.pipeline.store().saved_records(author) {
                Ok(records) => records.into_iter().map(Some).collect(),
                Err(error) => {
                    warn!(error = %error, "saved records unavailable; not reusing");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        let threshold = self.scorer.config().duplicate_threshold;

        works
            .into_iter()
            .map(|work| {
                let Some(title) = work.title.as_deref() else {
                    return WorkSeed::new(work);
                };
                let matched = saved.iter_mut().find(|slot| {
                    slot.as_ref().is_some_and(|record| {
                        record
                            .candidate
                            .title
                            .as_deref()
                            .is_some_and(|saved| title_similarity(title, saved) > threshold)
                    })
                });
                match matched.and_then(Option::take) {
                    Some(record) => {
                        let mut baseline = record.candidate;
                        fill_missing(&mut baseline, &work);
                        debug!(path = %record.path.display(), "reusing saved record as seed");
                        WorkSeed::reused(baseline, record.path)
                    }
                    None => WorkSeed::new(work),
                }
            })
            .collect()
    }
}
