//! One `.bib` file per work under a per-author directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::naming::{author_dirname, bib_filename, citekey, key_stem, numbered};
use super::shortener::{SignificantWords, TitleShortener};
use super::writer::render_bibtex;
use super::{RecordStore, SavedRecord, StorageError};
use crate::author::AuthorRecord;
use crate::config::OutputConfig;
use crate::parser::parse_bibtex;
use crate::record::{CanonicalRecord, Source};

/// Collision suffixes tried before giving up on a unique name.
const MAX_COLLISIONS: usize = 1000;

/// Filesystem-backed [`RecordStore`] writing BibTeX.
#[derive(Clone)]
pub struct BibtexStore {
    root: PathBuf,
    citekey_words: usize,
    filename_max_len: usize,
    shortener: Option<Arc<dyn TitleShortener>>,
    fallback: SignificantWords,
}

impl std::fmt::Debug for BibtexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BibtexStore")
            .field("root", &self.root)
            .field("citekey_words", &self.citekey_words)
            .field("filename_max_len", &self.filename_max_len)
            .field("shortener", &self.shortener.is_some())
            .finish_non_exhaustive()
    }
}

impl BibtexStore {
    #[must_use]
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            root: output.dir.clone(),
            citekey_words: output.citekey_words,
            filename_max_len: output.filename_max_len,
            shortener: None,
            fallback: SignificantWords::new(),
        }
    }

    /// Uses `shortener` first; the significant-words rule still covers its misses.
    #[must_use]
    pub fn with_shortener(mut self, shortener: Arc<dyn TitleShortener>) -> Self {
        self.shortener = Some(shortener);
        self
    }

    #[must_use]
    pub fn author_dir(&self, author: &AuthorRecord) -> PathBuf {
        self.root.join(author_dirname(author))
    }

    fn short_title(&self, title: &str) -> String {
        self.shortener
            .as_ref()
            .and_then(|shortener| shortener.shorten(title, self.citekey_words))
            .filter(|short| !short.trim().is_empty())
            .or_else(|| self.fallback.shorten(title, self.citekey_words))
            .unwrap_or_else(|| "Untitled".to_string())
    }

    /// Citation key and file name for `record`.
    #[must_use]
    pub fn names_for(&self, record: &CanonicalRecord) -> (String, String) {
        let stem = key_stem(record.authors(), record.year());
        let short = self.short_title(record.title().unwrap_or_default());
        (
            citekey(&stem, &short),
            bib_filename(&stem, &short, self.filename_max_len),
        )
    }

    /// Picks the path for `content`: the base name unless it holds a different
    /// record, else the first free or identical `-N` variant.
    fn choose_path(
        &self,
        dir: &Path,
        filename: &str,
        content: &str,
        preferred: Option<&Path>,
    ) -> PathBuf {
        for n in 0..MAX_COLLISIONS {
            let name = if n == 0 {
                filename.to_string()
            } else {
                numbered(filename, n)
            };
            let path = dir.join(name);
            if !path.exists() || preferred == Some(path.as_path()) {
                return path;
            }
            if fs::read_to_string(&path).is_ok_and(|existing| existing == content) {
                debug!(path = %path.display(), "identical record already saved");
                return path;
            }
        }
        dir.join(numbered(filename, MAX_COLLISIONS))
    }
}

impl RecordStore for BibtexStore {
    #[instrument(skip(self, author), fields(author = %author.name))]
    fn saved_records(&self, author: &AuthorRecord) -> Result<Vec<SavedRecord>, StorageError> {
        let dir = self.author_dir(author);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::ReadDir { path: dir, source }),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "bib"))
            .collect();
        paths.sort();

        let mut saved = Vec::with_capacity(paths.len());
        for path in paths {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "saved record not readable");
                    continue;
                }
            };
            match parse_bibtex(&text).entries.first() {
                Some(entry) => saved.push(SavedRecord {
                    candidate: entry.to_candidate(Source::ScholarBaseline),
                    path,
                }),
                None => warn!(path = %path.display(), "saved record has no BibTeX entry"),
            }
        }
        debug!(count = saved.len(), dir = %dir.display(), "loaded saved records");
        Ok(saved)
    }

    #[instrument(skip(self, author, record), fields(author = %author.name))]
    fn save(
        &self,
        author: &AuthorRecord,
        record: &CanonicalRecord,
        preferred: Option<&Path>,
    ) -> Result<PathBuf, StorageError> {
        let dir = self.author_dir(author);
        fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let (key, filename) = self.names_for(record);
        let content = render_bibtex(record, &key);
        let path = self.choose_path(&dir, &filename, &content, preferred);

        let tmp = path.with_extension("bib.tmp");
        fs::write(&tmp, content).map_err(|source| StorageError::Write {
            path: tmp.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(StorageError::Write {
                path: path.clone(),
                source,
            });
        }

        // The old file goes only once its replacement is on disk.
        if let Some(old) = preferred
            && old != path
            && old.exists()
        {
            match fs::remove_file(old) {
                Ok(()) => debug!(old = %old.display(), new = %path.display(), "record renamed"),
                Err(err) => warn!(path = %old.display(), error = %err, "stale record not removed"),
            }
        }
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use crate::merge::TrustMergeEngine;
    use crate::record::{RawCandidate, TrustOrder};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> BibtexStore {
        BibtexStore::new(&OutputConfig {
            dir: dir.path().to_path_buf(),
            citekey_words: 2,
            ..OutputConfig::default()
        })
    }

    fn record(title: &str, venue: &str) -> CanonicalRecord {
        let baseline = RawCandidate::new(Source::ScholarBaseline).with_title(title);
        let crossref = RawCandidate::new(Source::Crossref)
            .with_title(title)
            .with_authors(["Doe, Jane"])
            .with_year(2023)
            .with_venue(venue);
        TrustMergeEngine::new(Arc::new(TrustOrder::default()), MergeConfig::default())
            .merge(&baseline, &[crossref], None)
    }

    fn author() -> AuthorRecord {
        AuthorRecord::new("Jane Doe").with_scholar_id("abc123")
    }

    #[test]
    fn test_save_uses_author_dir_and_key() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let path = store
            .save(&author(), &record("Deep Learning for X", "Journal of X"), None)
            .unwrap();
        assert_eq!(path, dir.path().join("Doe (abc123)").join("Doe2023-DeepLearning.bib"));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("@article{Doe2023:DeepLearning,"));
    }

    #[test]
    fn test_collision_gets_numbered_suffix() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let first = store
            .save(&author(), &record("Deep Learning for X", "Journal of X"), None)
            .unwrap();
        let second = store
            .save(&author(), &record("Deep Learning for X", "Journal of Y"), None)
            .unwrap();
        assert_ne!(first, second);
        assert!(second.ends_with("Doe2023-DeepLearning-1.bib"));
    }

    #[test]
    fn test_identical_content_reuses_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let work = record("Deep Learning for X", "Journal of X");
        let first = store.save(&author(), &work, None).unwrap();
        let second = store.save(&author(), &work, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_preferred_path_is_replaced_on_rename() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let author_dir = store.author_dir(&author());
        fs::create_dir_all(&author_dir).unwrap();
        let old = author_dir.join("Doe2023-Old.bib");
        fs::write(&old, "@misc{old, title = {Deep Learning for X}}").unwrap();

        let path = store
            .save(&author(), &record("Deep Learning for X", "Journal of X"), Some(&old))
            .unwrap();
        assert!(!old.exists());
        assert!(path.exists());
        assert!(!path.with_extension("bib.tmp").exists());
    }

    #[test]
    fn test_failed_write_keeps_preferred_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let author_dir = store.author_dir(&author());
        fs::create_dir_all(&author_dir).unwrap();
        let old = author_dir.join("Doe2023-Old.bib");
        let old_text = "@misc{old, title = {Deep Learning for X}}";
        fs::write(&old, old_text).unwrap();
        // A directory where the temporary file would go makes the write fail.
        fs::create_dir(author_dir.join("Doe2023-DeepLearning.bib.tmp")).unwrap();

        let error = store
            .save(&author(), &record("Deep Learning for X", "Journal of X"), Some(&old))
            .unwrap_err();
        assert!(matches!(error, StorageError::Write { .. }));
        assert_eq!(fs::read_to_string(&old).unwrap(), old_text);
        assert!(!author_dir.join("Doe2023-DeepLearning.bib").exists());
    }

    #[test]
    fn test_saved_records_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.saved_records(&author()).unwrap().is_empty());

        let path = store
            .save(&author(), &record("Deep Learning for X", "Journal of X"), None)
            .unwrap();
        let saved = store.saved_records(&author()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].path, path);
        assert_eq!(saved[0].candidate.title.as_deref(), Some("Deep Learning for X"));
        assert_eq!(saved[0].candidate.year, Some(2023));
    }

    struct Fixed;

    impl TitleShortener for Fixed {
        fn shorten(&self, _title: &str, _max_words: usize) -> Option<String> {
            Some("Custom".to_string())
        }
    }

    #[test]
    fn test_external_shortener_takes_precedence() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).with_shortener(Arc::new(Fixed));
        let (key, file) = store.names_for(&record("Deep Learning for X", "Journal of X"));
        assert_eq!(key, "Doe2023:Custom");
        assert_eq!(file, "Doe2023-Custom.bib");
    }
}
