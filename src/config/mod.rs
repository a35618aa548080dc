//! Engine configuration: similarity weights, trust order, concurrency limits,
//! per-source timeouts and discovery bounds.
//!
//! Every field has a default, so an empty TOML file (or no file at all) yields
//! the stock behavior. Values are checked by [`EngineConfig::validate`] before use.

mod error;
mod file;
mod keys;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use error::ConfigError;
pub use file::{LoadedConfig, load_config, parse_config_str, resolve_default_config_path};
pub use keys::{ApiKeys, OpenReviewCredentials};

use crate::record::{FieldKind, Source, TrustOrder};

/// Default author-level worker count.
pub const DEFAULT_AUTHOR_WORKERS: usize = 12;
/// Default bound on concurrent source calls for one article.
pub const DEFAULT_ARTICLE_WORKERS: usize = 6;
/// Default delay between sequential articles of one author.
pub const DEFAULT_ARTICLE_DELAY_MS: u64 = 500;
/// Default per-call timeout for source collaborators.
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 10;
/// Default retry count for transient source failures.
pub const DEFAULT_SOURCE_RETRIES: u32 = 2;

/// Top-level configuration consumed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub similarity: SimilarityConfig,
    pub merge: MergeConfig,
    pub concurrency: ConcurrencyConfig,
    pub sources: SourcesConfig,
    pub discovery: DiscoveryConfig,
    pub output: OutputConfig,
}

/// Weights and thresholds for the similarity scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimilarityConfig {
    pub title_weight: f64,
    pub author_bonus: f64,
    pub year_bonus: f64,
    /// Years this far apart (or closer) still earn the year bonus.
    pub year_window: u32,
    /// Title similarity below this makes the whole score 0.
    pub title_min: f64,
    pub duplicate_threshold: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            title_weight: 0.7,
            author_bonus: 0.2,
            year_bonus: 0.2,
            year_window: 1,
            title_min: 0.8,
            duplicate_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    /// All 13 sources, most trusted first.
    pub trust_order: Vec<Source>,
    /// Field kinds that count toward `trust_hits`.
    pub trust_hit_fields: Vec<FieldKind>,
    /// When set, a merged record only carries a DOI that the resolver locked.
    pub lock_doi_only: bool,
    /// Number of top trust tiers considered when picking the author list.
    pub author_tiers: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            trust_order: Source::ALL.to_vec(),
            trust_hit_fields: FieldKind::ALL.to_vec(),
            lock_doi_only: false,
            author_tiers: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConcurrencyConfig {
    pub author_workers: usize,
    pub article_workers: usize,
    pub article_delay_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            author_workers: DEFAULT_AUTHOR_WORKERS,
            article_workers: DEFAULT_ARTICLE_WORKERS,
            article_delay_ms: DEFAULT_ARTICLE_DELAY_MS,
        }
    }
}

impl ConcurrencyConfig {
    #[must_use]
    pub fn article_delay(&self) -> Duration {
        Duration::from_millis(self.article_delay_ms)
    }
}

/// Per-source override; unset values fall back to the `[sources]` defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceOverride {
    pub enabled: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Ranked candidates a source may return for one work.
    pub max_candidates: usize,
    pub overrides: BTreeMap<Source, SourceOverride>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
            max_retries: DEFAULT_SOURCE_RETRIES,
            max_candidates: 5,
            overrides: BTreeMap::new(),
        }
    }
}

/// Effective call settings for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSettings {
    pub enabled: bool,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl SourcesConfig {
    #[must_use]
    pub fn settings_for(&self, source: Source) -> SourceSettings {
        let over = self.overrides.get(&source).copied().unwrap_or_default();
        SourceSettings {
            enabled: over.enabled.unwrap_or(true),
            timeout: Duration::from_secs(over.timeout_secs.unwrap_or(self.timeout_secs)),
            max_retries: over.max_retries.unwrap_or(self.max_retries),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    pub contribution_window_years: u32,
    pub publications_per_year: u32,
    /// Seed works from records saved by a previous run.
    pub reuse_saved_records: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            contribution_window_years: 5,
            publications_per_year: 50,
            reuse_saved_records: true,
        }
    }
}

impl DiscoveryConfig {
    /// Upper bound on works taken from one author's listings.
    #[must_use]
    pub fn max_publications_per_author(&self) -> usize {
        (self.contribution_window_years as usize) * (self.publications_per_year as usize)
    }

    /// Earliest year inside the contribution window ending at `current_year`.
    #[must_use]
    pub fn min_year(&self, current_year: i32) -> i32 {
        let span = i32::try_from(self.contribution_window_years).unwrap_or(i32::MAX);
        current_year.saturating_sub(span.saturating_sub(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub summary_file: String,
    /// Significant title words used in citation keys and file names.
    pub citekey_words: usize,
    pub filename_max_len: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            summary_file: "summary.csv".to_string(),
            citekey_words: 4,
            filename_max_len: 60,
        }
    }
}

impl OutputConfig {
    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(&self.summary_file)
    }
}

impl EngineConfig {
    /// Validates values against the ranges the engine supports.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] naming the first offending field, or
    /// [`ConfigError::TrustOrder`] when the trust order is not a permutation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.similarity;
        check_unit("similarity.title_weight", sim.title_weight)?;
        check_unit("similarity.author_bonus", sim.author_bonus)?;
        check_unit("similarity.year_bonus", sim.year_bonus)?;
        check_unit("similarity.title_min", sim.title_min)?;
        if !(sim.duplicate_threshold > 0.0 && sim.duplicate_threshold <= 1.0) {
            return Err(ConfigError::out_of_range(
                "similarity.duplicate_threshold",
                sim.duplicate_threshold,
                "(0.0, 1.0]",
            ));
        }
        if sim.title_weight <= 0.0 {
            return Err(ConfigError::out_of_range(
                "similarity.title_weight",
                sim.title_weight,
                "(0.0, 1.0]",
            ));
        }
        check_range("similarity.year_window", sim.year_window, 0..=10, "0..=10")?;

        self.trust_order()?;
        check_range(
            "merge.author_tiers",
            self.merge.author_tiers,
            1..=Source::ALL.len(),
            "1..=13",
        )?;

        let conc = &self.concurrency;
        check_range("concurrency.author_workers", conc.author_workers, 1..=64, "1..=64")?;
        check_range("concurrency.article_workers", conc.article_workers, 1..=32, "1..=32")?;
        check_range(
            "concurrency.article_delay_ms",
            conc.article_delay_ms,
            0..=60_000,
            "0..=60000",
        )?;

        check_range("sources.timeout_secs", self.sources.timeout_secs, 1..=300, "1..=300")?;
        check_range("sources.max_retries", self.sources.max_retries, 0..=10, "0..=10")?;
        check_range("sources.max_candidates", self.sources.max_candidates, 1..=20, "1..=20")?;
        for over in self.sources.overrides.values() {
            if let Some(timeout) = over.timeout_secs {
                check_range("sources.overrides.timeout_secs", timeout, 1..=300, "1..=300")?;
            }
            if let Some(retries) = over.max_retries {
                check_range("sources.overrides.max_retries", retries, 0..=10, "0..=10")?;
            }
        }

        check_range(
            "discovery.contribution_window_years",
            self.discovery.contribution_window_years,
            1..=50,
            "1..=50",
        )?;
        check_range(
            "discovery.publications_per_year",
            self.discovery.publications_per_year,
            1..=1000,
            "1..=1000",
        )?;

        check_range("output.citekey_words", self.output.citekey_words, 1..=10, "1..=10")?;
        check_range(
            "output.filename_max_len",
            self.output.filename_max_len,
            20..=255,
            "20..=255",
        )?;
        Ok(())
    }

    /// Builds the immutable trust order from `merge.trust_order`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TrustOrder`] when the list is not a permutation of all sources.
    pub fn trust_order(&self) -> Result<TrustOrder, ConfigError> {
        Ok(TrustOrder::new(self.merge.trust_order.clone())?)
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, value, "0.0..=1.0"))
    }
}

fn check_range<T>(
    field: &'static str,
    value: T,
    range: std::ops::RangeInclusive<T>,
    expected: &'static str,
) -> Result<(), ConfigError>
where
    T: PartialOrd + ToString,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, value, expected))
    }
}
