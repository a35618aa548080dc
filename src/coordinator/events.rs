//! Run events and the single collector task that consumes them.
//!
//! Author tasks never touch the report sink directly; they send [`RunEvent`]s
//! and the collector writes rows and per-author log lines in arrival order.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::report::{ReportSink, SummaryRow};

#[derive(Debug, Clone)]
pub enum RunEvent {
    AuthorStarted {
        author: String,
        works: usize,
    },
    ArticleSaved {
        row: SummaryRow,
    },
    ArticleSkipped {
        author: String,
        title: String,
        reason: String,
    },
    AuthorFinished {
        author: String,
        saved: usize,
        skipped: usize,
    },
    AuthorFailed {
        author: String,
        error: String,
    },
}

/// Cloneable handle for emitting events; a disabled sender drops them.
#[derive(Debug, Clone, Default)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl EventSender {
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn send(&self, event: RunEvent) {
        if let Some(tx) = &self.tx
            && tx.send(event).is_err()
        {
            warn!("run event collector has stopped");
        }
    }
}

/// What the collector saw over the whole run.
#[derive(Debug)]
pub struct CollectorOutcome<S> {
    pub sink: S,
    pub rows: usize,
    pub sink_errors: usize,
}

/// Spawns the collector. It finishes once every [`EventSender`] clone is dropped.
pub fn spawn_collector<S>(mut sink: S) -> (EventSender, JoinHandle<CollectorOutcome<S>>)
where
    S: ReportSink + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let mut rows = 0usize;
        let mut sink_errors = 0usize;
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::AuthorStarted { author, works } => {
                    info!(author = %author, works, "author started");
                }
                RunEvent::ArticleSaved { row } => {
                    let path = row.file_path.clone();
                    match sink.record(row) {
                        Ok(()) => rows += 1,
                        Err(error) => {
                            sink_errors += 1;
                            warn!(path = %path, error = %error, "summary row not written");
                        }
                    }
                }
                RunEvent::ArticleSkipped {
                    author,
                    title,
                    reason,
                } => info!(author = %author, title = %title, reason = %reason, "work skipped"),
                RunEvent::AuthorFinished {
                    author,
                    saved,
                    skipped,
                } => info!(author = %author, saved, skipped, "author finished"),
                RunEvent::AuthorFailed { author, error } => {
                    error!(author = %author, error = %error, "author failed");
                }
            }
        }
        if let Err(error) = sink.finish() {
            sink_errors += 1;
            warn!(error = %error, "summary not finalized");
        }
        CollectorOutcome {
            sink,
            rows,
            sink_errors,
        }
    });
    (EventSender { tx: Some(tx) }, handle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::report::MemorySink;

    #[tokio::test]
    async fn test_collector_writes_saved_rows_and_stops_when_senders_drop() {
        let (events, handle) = spawn_collector(MemorySink::default());
        let clone = events.clone();
        clone.send(RunEvent::AuthorStarted {
            author: "Jane Doe".to_string(),
            works: 1,
        });
        clone.send(RunEvent::ArticleSaved {
            row: SummaryRow {
                file_path: "a.bib".to_string(),
                author: "Jane Doe".to_string(),
                trust_hits: 1,
                sources: BTreeSet::new(),
            },
        });
        drop(clone);
        drop(events);

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.rows, 1);
        assert_eq!(outcome.sink.rows[0].file_path, "a.bib");
        assert_eq!(outcome.sink_errors, 0);
    }

    #[test]
    fn test_disabled_sender_drops_events() {
        EventSender::disabled().send(RunEvent::AuthorFailed {
            author: "x".to_string(),
            error: "y".to_string(),
        });
    }
}
