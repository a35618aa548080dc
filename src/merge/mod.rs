//! Trust-hierarchy merge of validated candidates into one canonical record.
//!
//! Every field is chosen independently: candidates are walked most trusted
//! first (ties by arrival) and the first usable value wins. Authors, DOI,
//! entry type and extras have their own rules, documented on the helpers below.

pub mod entry_type;
pub mod extras;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::trace;

use crate::config::MergeConfig;
use crate::parser::doi::{find_arxiv_id, is_arxiv_doi, is_preprint_doi};
use crate::record::{
    CanonicalRecord, EntryType, FieldKind, RawCandidate, Source, Sourced, TrustOrder,
};
use crate::text::{clean_title, collapse_whitespace, is_placeholder, names};

pub use entry_type::classify_venue;
pub use extras::{INTERNAL_PREFIX, accept_extra, is_internal};

/// Years outside this range are treated as parse noise.
const VALID_YEARS: std::ops::RangeInclusive<i32> = 1900..=2099;

/// Merges one work's candidates according to a fixed trust order.
///
/// Pure and deterministic: the same inputs always yield the same record,
/// whatever order the validated candidates arrive in.
#[derive(Debug, Clone)]
pub struct TrustMergeEngine {
    order: Arc<TrustOrder>,
    config: MergeConfig,
}

/// One pool member with its sort key.
struct Ranked<'a> {
    rank: usize,
    arrival: usize,
    candidate: &'a RawCandidate,
}

impl TrustMergeEngine {
    #[must_use]
    pub fn new(order: Arc<TrustOrder>, config: MergeConfig) -> Self {
        Self { order, config }
    }

    #[must_use]
    pub fn order(&self) -> &TrustOrder {
        &self.order
    }

    /// Builds the canonical record for one work.
    ///
    /// `locked_doi` is the DOI fixed by early or late DOI resolution; when set
    /// it is copied verbatim and no candidate DOI is considered.
    #[must_use]
    pub fn merge(
        &self,
        baseline: &RawCandidate,
        validated: &[RawCandidate],
        locked_doi: Option<&Sourced<String>>,
    ) -> CanonicalRecord {
        let pool = self.pool(baseline, validated);

        let title = pick_title(&pool);
        let authors = self.pick_authors(&pool);
        let year = first_sourced(&pool, |c| c.year.filter(|y| VALID_YEARS.contains(y)));
        let venue = pick_text(&pool, |c| c.venue.as_deref());
        let doi = match locked_doi {
            Some(locked) => Some(locked.clone()),
            None if self.config.lock_doi_only => None,
            None => pick_trusted_doi(&pool),
        };
        let extras = pick_extras(&pool, doi.as_ref().map(|d| d.value.as_str()));
        let entry_type = infer_entry_type(
            &pool,
            venue.as_ref(),
            doi.as_ref(),
            &extras,
            baseline.source,
        );
        let validated_sources = self.trusted_suppliers(&pool, baseline);

        trace!(
            trust_hits = validated_sources.len(),
            candidates = pool.len(),
            entry_type = %entry_type.value,
            "merged record"
        );

        CanonicalRecord {
            title,
            authors,
            year,
            venue,
            entry_type,
            doi,
            extras,
            validated_sources,
            baseline_source: baseline.source,
        }
    }

    /// Baseline plus validated candidates, one per source (later arrivals
    /// replace earlier ones), sorted by trust then arrival. The baseline sorts
    /// after every validated candidate.
    fn pool<'a>(
        &self,
        baseline: &'a RawCandidate,
        validated: &'a [RawCandidate],
    ) -> Vec<Ranked<'a>> {
        let mut by_source: BTreeMap<Source, Ranked<'a>> = BTreeMap::new();
        by_source.insert(
            baseline.source,
            Ranked {
                rank: usize::MAX,
                arrival: 0,
                candidate: baseline,
            },
        );
        for (index, candidate) in validated.iter().enumerate() {
            by_source.insert(
                candidate.source,
                Ranked {
                    rank: self.order.rank(candidate.source),
                    arrival: index + 1,
                    candidate,
                },
            );
        }
        let mut pool: Vec<Ranked<'a>> = by_source.into_values().collect();
        pool.sort_by_key(|ranked| (ranked.rank, ranked.arrival));
        pool
    }

    /// Most complete author list among the top `author_tiers` candidates that
    /// carry authors. Completeness is the count of real names, then the count
    /// of names with a spelled-out given name; ties keep the more trusted list.
    fn pick_authors(&self, pool: &[Ranked<'_>]) -> Option<Sourced<Vec<String>>> {
        let mut best: Option<((usize, usize), Sourced<Vec<String>>)> = None;
        let with_authors = pool.iter().filter_map(|ranked| {
            let cleaned: Vec<String> = ranked
                .candidate
                .authors
                .iter()
                .map(|name| collapse_whitespace(name))
                .filter(|name| !name.is_empty() && !names::is_et_al(name))
                .collect();
            (!cleaned.is_empty()).then_some((ranked.candidate.source, cleaned))
        });

        for (source, authors) in with_authors.take(self.config.author_tiers.max(1)) {
            let full = authors
                .iter()
                .filter(|name| names::has_full_given_name(name))
                .count();
            let key = (authors.len(), full);
            if best.as_ref().is_none_or(|(best_key, _)| key > *best_key) {
                best = Some((key, Sourced::new(authors, source)));
            }
        }
        best.map(|(_, sourced)| sourced)
    }

    /// Distinct validated sources that supplied a value for a counted field kind.
    fn trusted_suppliers(
        &self,
        pool: &[Ranked<'_>],
        baseline: &RawCandidate,
    ) -> BTreeSet<Source> {
        let kinds: BTreeSet<FieldKind> = self.config.trust_hit_fields.iter().copied().collect();
        pool.iter()
            .filter(|ranked| !std::ptr::eq(ranked.candidate, baseline))
            .filter(|ranked| {
                kinds
                    .iter()
                    .any(|kind| supplies(ranked.candidate, *kind))
            })
            .map(|ranked| ranked.candidate.source)
            .collect()
    }
}

/// Whether a candidate carries a usable value of the given kind.
fn supplies(candidate: &RawCandidate, kind: FieldKind) -> bool {
    match kind {
        FieldKind::Title => candidate.title.is_some(),
        FieldKind::Authors => candidate.authors.iter().any(|name| !names::is_et_al(name)),
        FieldKind::Year => candidate.year.is_some_and(|y| VALID_YEARS.contains(&y)),
        FieldKind::Venue => candidate.venue.is_some(),
        FieldKind::EntryType => candidate.entry_type_hint.is_some() || candidate.venue.is_some(),
        FieldKind::Doi => candidate.doi.is_some(),
        FieldKind::Extras => candidate.extras.keys().any(|key| !is_internal(key)),
    }
}

fn first_sourced<T>(
    pool: &[Ranked<'_>],
    pick: impl Fn(&RawCandidate) -> Option<T>,
) -> Option<Sourced<T>> {
    pool.iter().find_map(|ranked| {
        pick(ranked.candidate).map(|value| Sourced::new(value, ranked.candidate.source))
    })
}

/// First non-placeholder text by trust, falling back to the first non-empty one.
fn pick_text<'a>(
    pool: &[Ranked<'a>],
    pick: impl Fn(&'a RawCandidate) -> Option<&'a str>,
) -> Option<Sourced<String>> {
    let values: Vec<Sourced<String>> = pool
        .iter()
        .filter_map(|ranked| {
            pick(ranked.candidate)
                .map(collapse_whitespace)
                .filter(|value| !value.is_empty())
                .map(|value| Sourced::new(value, ranked.candidate.source))
        })
        .collect();
    let fallback = values.first().cloned();
    values
        .into_iter()
        .find(|sourced| !is_placeholder(&sourced.value))
        .or(fallback)
}

fn pick_title(pool: &[Ranked<'_>]) -> Option<Sourced<String>> {
    let cleaned: Vec<(usize, String)> = pool
        .iter()
        .enumerate()
        .filter_map(|(index, ranked)| {
            let title = clean_title(ranked.candidate.title.as_deref()?);
            (!title.is_empty()).then_some((index, title))
        })
        .collect();
    let (index, title) = cleaned
        .iter()
        .find(|(_, title)| !is_placeholder(title))
        .or_else(|| cleaned.first())?;
    Some(Sourced::new(title.clone(), pool[*index].candidate.source))
}

/// First DOI from a DOI-trusted source, published DOIs before arXiv ones.
fn pick_trusted_doi(pool: &[Ranked<'_>]) -> Option<Sourced<String>> {
    let trusted: Vec<Sourced<String>> = pool
        .iter()
        .filter(|ranked| ranked.candidate.source.is_doi_trusted())
        .filter_map(|ranked| {
            ranked
                .candidate
                .doi
                .clone()
                .map(|doi| Sourced::new(doi, ranked.candidate.source))
        })
        .collect();
    let fallback = trusted.first().cloned();
    trusted
        .into_iter()
        .find(|sourced| !is_arxiv_doi(&sourced.value))
        .or(fallback)
}

/// Per-key first acceptable value by trust; arXiv bookkeeping keys are
/// dropped once a published DOI is present.
fn pick_extras(pool: &[Ranked<'_>], doi: Option<&str>) -> BTreeMap<String, Sourced<String>> {
    let published_doi = doi.is_some_and(|doi| !is_arxiv_doi(doi));
    let mut merged: BTreeMap<String, Sourced<String>> = BTreeMap::new();
    for ranked in pool {
        for (key, value) in &ranked.candidate.extras {
            if merged.contains_key(key) {
                continue;
            }
            if published_doi && extras::ARXIV_KEYS.contains(&key.as_str()) {
                continue;
            }
            let accepted = if is_internal(key) {
                Some(value.clone())
            } else {
                accept_extra(key, value)
            };
            if let Some(value) = accepted {
                merged.insert(key.clone(), Sourced::new(value, ranked.candidate.source));
            }
        }
    }
    merged
}

/// Entry type from the merged venue, else from hints, else from preprint
/// signals in the DOI or extras.
fn infer_entry_type(
    pool: &[Ranked<'_>],
    venue: Option<&Sourced<String>>,
    doi: Option<&Sourced<String>>,
    extras: &BTreeMap<String, Sourced<String>>,
    baseline_source: Source,
) -> Sourced<EntryType> {
    if let Some(venue) = venue {
        if let Some(kind) = classify_venue(&venue.value) {
            return Sourced::new(kind, venue.source);
        }
        let hinted = pool.iter().find_map(|ranked| {
            ranked
                .candidate
                .entry_type_hint
                .as_deref()
                .and_then(EntryType::from_hint)
                .map(|kind| Sourced::new(kind, ranked.candidate.source))
        });
        return hinted.unwrap_or_else(|| Sourced::new(EntryType::Journal, venue.source));
    }

    if let Some(doi) = doi.filter(|doi| is_preprint_doi(&doi.value)) {
        return Sourced::new(EntryType::Preprint, doi.source);
    }
    let arxiv_extra = extras
        .iter()
        .filter(|(key, _)| !is_internal(key))
        .find(|(key, sourced)| {
            find_arxiv_id(&sourced.value).is_some()
                || (key.as_str() == "archiveprefix" && sourced.value.eq_ignore_ascii_case("arxiv"))
        });
    if let Some((_, sourced)) = arxiv_extra {
        return Sourced::new(EntryType::Preprint, sourced.source);
    }
    Sourced::new(EntryType::Unknown, baseline_source)
}
