//! `summary.csv`: file path, author, trust hits and one 0/1 column per source.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ReportError, ReportSink, SummaryRow};
use crate::record::{Source, TrustOrder};

const FIXED_COLUMNS: [&str; 3] = ["file_path", "author", "trust_hits"];

/// CSV sink. Rows are keyed by file path, so a re-saved record replaces its
/// earlier row, including rows from previous runs found in the file.
#[derive(Debug)]
pub struct SummaryCsvWriter {
    path: PathBuf,
    columns: Vec<Source>,
    rows: BTreeMap<String, SummaryRow>,
}

impl SummaryCsvWriter {
    /// Opens `path`, loading rows an earlier run left there.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Csv`] when an existing file cannot be parsed.
    pub fn open(path: &Path, order: &TrustOrder) -> Result<Self, ReportError> {
        let mut writer = Self {
            path: path.to_path_buf(),
            columns: order.iter().collect(),
            rows: BTreeMap::new(),
        };
        if path.exists() {
            writer.load()?;
        }
        Ok(writer)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn csv_error(&self, source: csv::Error) -> ReportError {
        ReportError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&mut self) -> Result<(), ReportError> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.csv_error(e))?;
        let headers = reader.headers().map_err(|e| self.csv_error(e))?.clone();
        let source_columns: Vec<(usize, Source)> = headers
            .iter()
            .enumerate()
            .filter_map(|(index, name)| name.parse::<Source>().ok().map(|source| (index, source)))
            .collect();

        for record in reader.records() {
            let record = record.map_err(|e| self.csv_error(e))?;
            let Some(file_path) = record.get(0).filter(|value| !value.is_empty()) else {
                continue;
            };
            let row = SummaryRow {
                file_path: file_path.to_string(),
                author: record.get(1).unwrap_or_default().to_string(),
                trust_hits: record
                    .get(2)
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(0),
                sources: source_columns
                    .iter()
                    .filter(|(index, _)| record.get(*index) == Some("1"))
                    .map(|(_, source)| *source)
                    .collect(),
            };
            self.rows.insert(row.file_path.clone(), row);
        }
        debug!(rows = self.rows.len(), path = %self.path.display(), "loaded existing summary");
        Ok(())
    }

    /// Writes every row to a sibling temp file, then renames it over the summary.
    fn flush(&self) -> Result<(), ReportError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ReportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp = self.path.with_extension("csv.tmp");
        let mut writer = csv::Writer::from_path(&tmp).map_err(|e| self.csv_error(e))?;

        let mut header: Vec<&str> = FIXED_COLUMNS.to_vec();
        header.extend(self.columns.iter().map(|source| source.as_str()));
        writer.write_record(&header).map_err(|e| self.csv_error(e))?;

        for row in self.rows.values() {
            let mut fields = vec![
                row.file_path.clone(),
                row.author.clone(),
                row.trust_hits.to_string(),
            ];
            fields.extend(self.columns.iter().map(|source| {
                let flag = if row.sources.contains(source) { "1" } else { "0" };
                flag.to_string()
            }));
            writer.write_record(&fields).map_err(|e| self.csv_error(e))?;
        }
        writer.flush().map_err(|source| ReportError::Io {
            path: tmp.clone(),
            source,
        })?;
        drop(writer);

        fs::rename(&tmp, &self.path).map_err(|source| ReportError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl ReportSink for SummaryCsvWriter {
    fn record(&mut self, row: SummaryRow) -> Result<(), ReportError> {
        self.rows.insert(row.file_path.clone(), row);
        self.flush()
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        self.flush()
    }
}
