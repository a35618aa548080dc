//! Author worker pool.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use super::{
    AuthorBatchCoordinator, AuthorError, AuthorReport, EventSender, RunError, RunEvent,
    spawn_collector,
};
use crate::author::AuthorRecord;
use crate::report::ReportSink;

/// Result for one author, in scheduling order.
#[derive(Debug)]
pub struct AuthorOutcome {
    pub author: String,
    pub result: Result<AuthorReport, AuthorError>,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub authors: Vec<AuthorOutcome>,
    /// Summary rows the sink accepted.
    pub rows_written: usize,
    pub sink_errors: usize,
}

impl RunReport {
    #[must_use]
    pub fn saved(&self) -> usize {
        self.reports().map(|report| report.saved.len()).sum()
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.reports().map(|report| report.skipped.len()).sum()
    }

    pub fn reports(&self) -> impl Iterator<Item = &AuthorReport> {
        self.authors
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &AuthorError)> {
        self.authors.iter().filter_map(|outcome| {
            outcome
                .result
                .as_ref()
                .err()
                .map(|error| (outcome.author.as_str(), error))
        })
    }
}

/// Runs authors concurrently, each in its own task.
///
/// # Concurrency Model
///
/// - At most `author_workers` authors run at once (semaphore permits)
/// - Authors with more known publications are scheduled first
/// - A failed or panicked author is reported; the others keep running
/// - Summary rows flow through one collector task
#[derive(Debug, Clone)]
pub struct RunCoordinator {
    coordinator: Arc<AuthorBatchCoordinator>,
    author_workers: usize,
}

impl RunCoordinator {
    #[must_use]
    pub fn new(coordinator: AuthorBatchCoordinator, author_workers: usize) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            author_workers: author_workers.max(1),
        }
    }

    /// Processes every author and returns the report together with the sink.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Collector`] when the collector task died, taking the
    /// sink with it. Author failures are never errors here; they are in the report.
    #[instrument(skip_all, fields(authors = authors.len(), workers = self.author_workers))]
    pub async fn run<S>(
        &self,
        mut authors: Vec<AuthorRecord>,
        sink: S,
    ) -> Result<(RunReport, S), RunError>
    where
        S: ReportSink + 'static,
    {
        authors.sort_by_key(|author| std::cmp::Reverse(author.known_publications.unwrap_or(0)));
        let semaphore = Arc::new(Semaphore::new(self.author_workers));
        let (events, collector) = spawn_collector(sink);

        let mut handles = Vec::with_capacity(authors.len());
        for author in authors {
            let name = author.name.clone();
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                warn!(author = %name, "worker pool closed; author not started");
                continue;
            };
            let coordinator = Arc::clone(&self.coordinator);
            let events = events.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                process_author(&coordinator, &author, &events).await
            });
            handles.push((name, handle));
        }
        drop(events);

        let mut report = RunReport::default();
        for (author, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(error) => {
                    warn!(author = %author, error = %error, "author task panicked");
                    Err(AuthorError::Aborted {
                        author: author.clone(),
                        message: error.to_string(),
                    })
                }
            };
            report.authors.push(AuthorOutcome { author, result });
        }

        let outcome = collector.await?;
        report.rows_written = outcome.rows;
        report.sink_errors = outcome.sink_errors;
        info!(
            saved = report.saved(),
            skipped = report.skipped(),
            failed_authors = report.failures().count(),
            "run complete"
        );
        Ok((report, outcome.sink))
    }
}

async fn process_author(
    coordinator: &AuthorBatchCoordinator,
    author: &AuthorRecord,
    events: &EventSender,
) -> Result<AuthorReport, AuthorError> {
    let result = coordinator.process(author, events).await;
    if let Err(error) = &result {
        events.send(RunEvent::AuthorFailed {
            author: author.name.clone(),
            error: error.to_string(),
        });
    }
    result
}
