//! Per-article state threaded through the enrichment phases.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::matching::RejectReason;
use crate::record::{RawCandidate, Source, Sourced};
use crate::source::DoiResolution;

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    EarlyDoi,
    Enrichment,
    LateDoi,
    Merge,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EarlyDoi => "early-doi",
            Self::Enrichment => "enrichment",
            Self::LateDoi => "late-doi",
            Self::Merge => "merge",
        })
    }
}

/// One work to enrich.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkSeed {
    pub baseline: RawCandidate,
    /// Path of the saved record this seed was loaded from.
    pub saved_path: Option<PathBuf>,
}

impl WorkSeed {
    #[must_use]
    pub fn new(baseline: RawCandidate) -> Self {
        Self {
            baseline,
            saved_path: None,
        }
    }

    #[must_use]
    pub fn reused(baseline: RawCandidate, saved_path: PathBuf) -> Self {
        Self {
            baseline,
            saved_path: Some(saved_path),
        }
    }

    #[must_use]
    pub fn is_reused(&self) -> bool {
        self.saved_path.is_some()
    }
}

/// A candidate the validator turned away.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub source: Source,
    pub phase: Phase,
    pub reason: RejectReason,
}

/// A collaborator call that produced nothing because it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: Source,
    pub phase: Phase,
    pub message: String,
}

/// Mutable state of one article run.
///
/// `seed` is the baseline as discovered, minus any DOI that early resolution
/// disproved. `baseline` starts as a copy and picks up a provisional DOI from
/// the first accepted candidate that carries one; later candidates are
/// validated against it.
#[derive(Debug, Clone)]
pub struct EnrichmentContext {
    seed: RawCandidate,
    baseline: RawCandidate,
    reused: bool,
    validated: Vec<RawCandidate>,
    locked_doi: Option<Sourced<String>>,
    resolutions: BTreeMap<String, DoiResolution>,
    rejections: Vec<Rejection>,
    failures: Vec<SourceFailure>,
    phases: Vec<Phase>,
}

impl EnrichmentContext {
    #[must_use]
    pub fn new(seed: &WorkSeed) -> Self {
        Self {
            seed: seed.baseline.clone(),
            baseline: seed.baseline.clone(),
            reused: seed.is_reused(),
            validated: Vec::new(),
            locked_doi: None,
            resolutions: BTreeMap::new(),
            rejections: Vec::new(),
            failures: Vec::new(),
            phases: Vec::new(),
        }
    }

    #[must_use]
    pub fn seed(&self) -> &RawCandidate {
        &self.seed
    }

    /// Baseline used for validation, including any provisional DOI.
    #[must_use]
    pub fn baseline(&self) -> &RawCandidate {
        &self.baseline
    }

    #[must_use]
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    #[must_use]
    pub fn validated(&self) -> &[RawCandidate] {
        &self.validated
    }

    #[must_use]
    pub fn locked_doi(&self) -> Option<&Sourced<String>> {
        self.locked_doi.as_ref()
    }

    #[must_use]
    pub fn provisional_doi(&self) -> Option<&str> {
        self.baseline.doi.as_deref()
    }

    #[must_use]
    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    #[must_use]
    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    /// Phases entered so far, in order.
    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        self.phases.push(phase);
    }

    pub(crate) fn accept(&mut self, candidate: RawCandidate) {
        self.validated.push(candidate);
    }

    pub(crate) fn reject(&mut self, source: Source, phase: Phase, reason: RejectReason) {
        self.rejections.push(Rejection {
            source,
            phase,
            reason,
        });
    }

    pub(crate) fn fail(&mut self, source: Source, phase: Phase, message: impl Into<String>) {
        self.failures.push(SourceFailure {
            source,
            phase,
            message: message.into(),
        });
    }

    /// Sets the provisional DOI unless one is already held.
    pub(crate) fn offer_provisional_doi(&mut self, doi: &str) -> bool {
        if self.baseline.doi.is_some() {
            return false;
        }
        self.baseline.doi = Some(doi.to_string());
        true
    }

    /// Removes a DOI that resolution disproved from both baselines.
    pub(crate) fn drop_baseline_doi(&mut self) {
        self.seed.doi = None;
        self.baseline.doi = None;
    }

    /// Locks `doi`; a locked DOI is never replaced.
    pub(crate) fn lock_doi(&mut self, doi: &str, source: Source) {
        if self.locked_doi.is_none() {
            self.locked_doi = Some(Sourced::new(doi.to_string(), source));
            self.baseline.doi = Some(doi.to_string());
        }
    }

    #[must_use]
    pub fn cached_resolution(&self, doi: &str) -> Option<&DoiResolution> {
        self.resolutions.get(doi)
    }

    pub(crate) fn cache_resolution(&mut self, doi: &str, resolution: DoiResolution) {
        self.resolutions.insert(doi.to_string(), resolution);
    }
}
