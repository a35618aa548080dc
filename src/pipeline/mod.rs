//! Article enrichment: early DOI validation, API fan-out, late DOI discovery,
//! then merge and save.
//!
//! Every phase is entered for every article, even when it has nothing to do,
//! so the phase log of an [`EnrichmentContext`] always reads
//! `early-doi, enrichment, late-doi, merge`. Source failures never abort an
//! article; they are logged at warn level and recorded on the context.

mod context;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::{StreamExt, stream};
use tracing::{debug, info, instrument, warn};

use crate::author::AuthorRecord;
use crate::config::{EngineConfig, SourcesConfig};
use crate::matching::{CandidateValidator, RejectReason, SimilarityScorer, Verdict};
use crate::merge::{TrustMergeEngine, is_internal};
use crate::parser::{extract_dois, is_arxiv_doi, normalize_doi};
use crate::record::{CanonicalRecord, RawCandidate, Source, TrustOrder};
use crate::source::{
    DoiResolution, FetchOutcome, LANDING_URL_KEY, RetryPolicy, SourceError, SourceRegistry,
    WorkHint,
};
use crate::storage::RecordStore;

pub use context::{EnrichmentContext, Phase, Rejection, SourceFailure, WorkSeed};
pub use error::ArticleError;

/// Landing pages fetched per article while looking for a DOI.
const MAX_LANDING_PAGES: usize = 3;

/// Outcome of one finished article.
#[derive(Debug, Clone)]
pub struct ArticleReport {
    pub record: CanonicalRecord,
    pub path: PathBuf,
    pub reused: bool,
    pub rejections: Vec<Rejection>,
    pub failures: Vec<SourceFailure>,
}

/// Runs the four phases for one work at a time.
///
/// Shared by all articles of all authors; holds no per-article state.
#[derive(Clone)]
pub struct ArticlePipeline {
    registry: Arc<SourceRegistry>,
    store: Arc<dyn RecordStore>,
    validator: CandidateValidator,
    merger: TrustMergeEngine,
    order: Arc<TrustOrder>,
    sources: SourcesConfig,
    article_workers: usize,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ArticlePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticlePipeline")
            .field("registry", &self.registry)
            .field("article_workers", &self.article_workers)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ArticlePipeline {
    #[must_use]
    pub fn new(
        config: &EngineConfig,
        order: Arc<TrustOrder>,
        registry: Arc<SourceRegistry>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            registry,
            store,
            validator: CandidateValidator::new(SimilarityScorer::new(config.similarity)),
            merger: TrustMergeEngine::new(Arc::clone(&order), config.merge.clone()),
            order,
            sources: config.sources.clone(),
            article_workers: config.concurrency.article_workers.max(1),
            retry: RetryPolicy::with_retries(config.sources.max_retries),
        }
    }

    /// Replaces the backoff shape; per-source retry counts still apply.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Enriches, merges and saves one work.
    ///
    /// # Errors
    ///
    /// Returns [`ArticleError::InsufficientBaseline`] when the seed has neither
    /// title nor DOI, and [`ArticleError::Storage`] when the record cannot be saved.
    #[instrument(skip_all, fields(author = %author.name, title = seed.baseline.title.as_deref().unwrap_or("")))]
    pub async fn run(
        &self,
        author: &AuthorRecord,
        seed: &WorkSeed,
    ) -> Result<ArticleReport, ArticleError> {
        let mut ctx = self.enrich(seed).await?;
        let record = self.merge(&mut ctx);
        let path = self
            .store
            .save(author, &record, seed.saved_path.as_deref())
            .map_err(|error| ArticleError::Storage {
                title: record.title().unwrap_or_default().to_string(),
                error,
            })?;

        info!(
            path = %path.display(),
            trust_hits = record.trust_hits(),
            doi = record.doi().unwrap_or(""),
            rejected = ctx.rejections().len(),
            failed = ctx.failures().len(),
            "saved record"
        );
        Ok(ArticleReport {
            record,
            path,
            reused: ctx.is_reused(),
            rejections: ctx.rejections().to_vec(),
            failures: ctx.failures().to_vec(),
        })
    }

    /// Runs phases 1 to 3 and returns the populated context.
    ///
    /// # Errors
    ///
    /// Returns [`ArticleError::InsufficientBaseline`] when the seed has neither
    /// title nor DOI.
    pub async fn enrich(&self, seed: &WorkSeed) -> Result<EnrichmentContext, ArticleError> {
        if !seed.baseline.has_evidence() {
            warn!(origin = %seed.baseline.source, "work has neither title nor DOI; skipped");
            return Err(ArticleError::InsufficientBaseline {
                origin: seed.baseline.source,
            });
        }

        let mut ctx = EnrichmentContext::new(seed);
        self.early_doi(&mut ctx).await;
        self.enrichment(&mut ctx).await;
        self.late_doi(&mut ctx).await;
        Ok(ctx)
    }

    /// Phase 4: the trust merge over the seed and every validated candidate.
    pub fn merge(&self, ctx: &mut EnrichmentContext) -> CanonicalRecord {
        ctx.enter(Phase::Merge);
        self.merger
            .merge(ctx.seed(), ctx.validated(), ctx.locked_doi())
    }

    /// Phase 1: confirm the seed's DOI before anything trusts it.
    async fn early_doi(&self, ctx: &mut EnrichmentContext) {
        ctx.enter(Phase::EarlyDoi);
        let Some(raw) = ctx.seed().doi.clone() else {
            return;
        };
        if self.registry.resolver().is_none() {
            debug!(doi = %raw, "no DOI resolver configured; keeping DOI provisional");
            return;
        }
        let Some(doi) = normalize_doi(&raw) else {
            info!(doi = %raw, "baseline DOI is malformed; dropped");
            ctx.drop_baseline_doi();
            return;
        };

        match self.resolve(ctx, &doi, Phase::EarlyDoi).await {
            Some(DoiResolution::NotFound) => {
                info!(doi = %doi, "baseline DOI does not resolve; dropped");
                ctx.drop_baseline_doi();
            }
            Some(resolution) => {
                let mut against = ctx.baseline().clone();
                against.doi = Some(doi.clone());
                match self.absorb_resolution(ctx, &against, &doi, resolution, Phase::EarlyDoi) {
                    Absorbed::Locked => {}
                    Absorbed::Mismatch => {
                        info!(doi = %doi, "resolved DOI describes another work; dropped");
                        ctx.drop_baseline_doi();
                    }
                    Absorbed::NoMetadata => {
                        debug!(doi = %doi, "resolver returned no metadata; keeping DOI provisional");
                    }
                }
            }
            None => debug!(doi = %doi, "resolver unavailable; keeping DOI provisional"),
        }
    }

    /// Phase 2: every enabled source, bounded by `article_workers`, results
    /// handled in registry order once all calls have finished.
    async fn enrichment(&self, ctx: &mut EnrichmentContext) {
        ctx.enter(Phase::Enrichment);
        let hint = WorkHint::from_baseline(ctx.baseline(), self.sources.max_candidates);
        let reused = ctx.is_reused();
        let hint = &hint;

        let mut calls: Vec<BoxFuture<'_, (Source, Result<FetchOutcome, SourceError>)>> =
            Vec::new();
        for collaborator in self.registry.sources() {
            if reused && collaborator.is_expensive() {
                debug!(source = %collaborator.source(), "skipping expensive source for saved record");
                continue;
            }
            let origin = collaborator.source();
            let settings = self.sources.settings_for(origin);
            let retry = self.retry.clone().with_max_retries(settings.max_retries);
            calls.push(
                async move {
                    let result = retry
                        .run(origin, settings.timeout, || collaborator.fetch(hint))
                        .await;
                    (origin, result)
                }
                .boxed(),
            );
        }

        let outcomes: Vec<(Source, Result<FetchOutcome, SourceError>)> = stream::iter(calls)
            .buffered(self.article_workers)
            .collect()
            .await;

        for (origin, result) in outcomes {
            match result {
                Ok(FetchOutcome::Candidates(candidates)) => {
                    self.take_first_accepted(ctx, origin, candidates);
                }
                Ok(FetchOutcome::NotFound) => debug!(source = %origin, "no match"),
                Err(error) => {
                    warn!(source = %origin, error = %error, "source unavailable");
                    ctx.fail(origin, Phase::Enrichment, error.to_string());
                }
            }
        }
    }

    /// Keeps the first candidate the validator accepts against the evolving baseline.
    fn take_first_accepted(
        &self,
        ctx: &mut EnrichmentContext,
        origin: Source,
        candidates: Vec<RawCandidate>,
    ) {
        for candidate in candidates {
            match self.validator.validate(ctx.baseline(), &candidate) {
                Verdict::Accepted(reason) => {
                    debug!(source = %origin, ?reason, "candidate accepted");
                    if let Some(doi) = candidate.doi.as_deref().and_then(normalize_doi)
                        && !is_arxiv_doi(&doi)
                        && ctx.offer_provisional_doi(&doi)
                    {
                        debug!(source = %origin, doi = %doi, "provisional DOI");
                    }
                    ctx.accept(candidate);
                    return;
                }
                Verdict::Rejected(reason) => {
                    log_rejection(origin, Phase::Enrichment, &reason);
                    ctx.reject(origin, Phase::Enrichment, reason);
                }
            }
        }
    }

    /// Phase 3: find, resolve and lock a DOI when none is locked yet.
    async fn late_doi(&self, ctx: &mut EnrichmentContext) {
        ctx.enter(Phase::LateDoi);
        if ctx.locked_doi().is_some() || self.registry.resolver().is_none() {
            return;
        }
        let Some(doi) = self.discover_doi(ctx).await else {
            debug!("no DOI found for late resolution");
            return;
        };

        match self.resolve(ctx, &doi, Phase::LateDoi).await {
            Some(DoiResolution::NotFound) => info!(doi = %doi, "discovered DOI does not resolve"),
            Some(resolution) => {
                // Untitled seeds can only be matched on the DOI itself.
                let mut against = ctx.seed().clone();
                against.doi = (!against.has_title()).then(|| doi.clone());
                match self.absorb_resolution(ctx, &against, &doi, resolution, Phase::LateDoi) {
                    Absorbed::Locked => {}
                    Absorbed::Mismatch => {
                        info!(doi = %doi, "discovered DOI describes another work; not locked");
                    }
                    Absorbed::NoMetadata => {
                        info!(doi = %doi, "discovered DOI has no resolver metadata; not locked");
                    }
                }
            }
            None => {}
        }
    }

    /// First plausible DOI: the provisional DOI, candidate DOI fields, then
    /// DOIs in extras text, then landing pages. Published DOIs come before
    /// arXiv ones.
    async fn discover_doi(&self, ctx: &EnrichmentContext) -> Option<String> {
        let mut ranked: Vec<&RawCandidate> = ctx.validated().iter().collect();
        ranked.sort_by_key(|candidate| self.order.rank(candidate.source));

        let provisional = ctx.provisional_doi().and_then(normalize_doi);
        let plausible = |doi: &str| {
            provisional.as_deref().is_none_or(|held| held == doi)
                && ctx.cached_resolution(doi).is_none()
        };

        let mut found: Vec<String> = provisional.iter().cloned().collect();
        found.extend(
            ranked
                .iter()
                .filter_map(|candidate| candidate.doi.as_deref().and_then(normalize_doi)),
        );
        for candidate in &ranked {
            for (key, value) in &candidate.extras {
                if !is_internal(key) {
                    found.extend(extract_dois(value));
                }
            }
        }
        let mut seen = std::collections::HashSet::new();
        found.retain(|doi| seen.insert(doi.clone()));
        found.sort_by_key(|doi| is_arxiv_doi(doi));
        if let Some(doi) = found.into_iter().find(|doi| plausible(doi.as_str())) {
            return Some(doi);
        }

        let fetcher = self.registry.page_fetcher()?;
        let mut urls: Vec<&str> = Vec::new();
        for candidate in ranked.iter().copied().chain(std::iter::once(ctx.seed())) {
            for key in [LANDING_URL_KEY, "url"] {
                if let Some(url) = candidate.extras.get(key)
                    && !urls.contains(&url.as_str())
                {
                    urls.push(url);
                }
            }
        }
        let settings = self.sources.settings_for(Source::Csl);
        for url in urls.into_iter().take(MAX_LANDING_PAGES) {
            let result = self
                .retry
                .clone()
                .with_max_retries(0)
                .run(Source::Csl, settings.timeout, || fetcher.find_doi(url))
                .await;
            match result {
                Ok(Some(raw)) => {
                    if let Some(doi) = normalize_doi(&raw).filter(|doi| plausible(doi.as_str())) {
                        debug!(url, doi = %doi, "DOI found on landing page");
                        return Some(doi);
                    }
                }
                Ok(None) => debug!(url, "no DOI on landing page"),
                Err(error) => debug!(url, error = %error, "landing page unavailable"),
            }
        }
        None
    }

    /// Resolves `doi` once per article. Transport failures are recorded and
    /// not cached, so a later phase may try again.
    async fn resolve(
        &self,
        ctx: &mut EnrichmentContext,
        doi: &str,
        phase: Phase,
    ) -> Option<DoiResolution> {
        if let Some(cached) = ctx.cached_resolution(doi) {
            return Some(cached.clone());
        }
        let resolver = self.registry.resolver()?;
        let settings = self.sources.settings_for(Source::Csl);
        let result = self
            .retry
            .clone()
            .with_max_retries(settings.max_retries)
            .run(Source::Csl, settings.timeout, || resolver.resolve(doi))
            .await;
        match result {
            Ok(resolution) => {
                ctx.cache_resolution(doi, resolution.clone());
                Some(resolution)
            }
            Err(error) => {
                warn!(doi, %phase, error = %error, "DOI resolver unavailable");
                ctx.fail(Source::Csl, phase, error.to_string());
                None
            }
        }
    }

    /// Validates resolver output against `against`; accepted candidates join
    /// the validated set and lock `doi`. A resolution without usable metadata
    /// never locks.
    fn absorb_resolution(
        &self,
        ctx: &mut EnrichmentContext,
        against: &RawCandidate,
        doi: &str,
        resolution: DoiResolution,
        phase: Phase,
    ) -> Absorbed {
        let candidates: Vec<RawCandidate> = resolution
            .into_candidates()
            .into_iter()
            .filter(|candidate| self.sources.settings_for(candidate.source).enabled)
            .collect();
        if candidates.is_empty() {
            return Absorbed::NoMetadata;
        }

        let mut lock_source = None;
        for candidate in candidates {
            match self.validator.validate(against, &candidate) {
                Verdict::Accepted(_) => {
                    lock_source.get_or_insert(candidate.source);
                    ctx.accept(candidate);
                }
                Verdict::Rejected(reason) => {
                    log_rejection(candidate.source, phase, &reason);
                    ctx.reject(candidate.source, phase, reason);
                }
            }
        }
        match lock_source {
            Some(source) => {
                ctx.lock_doi(doi, source);
                info!(doi, %phase, %source, "DOI locked");
                Absorbed::Locked
            }
            None => Absorbed::Mismatch,
        }
    }
}

/// What validating one resolver answer did to the DOI.
enum Absorbed {
    Locked,
    Mismatch,
    NoMetadata,
}

fn log_rejection(origin: Source, phase: Phase, reason: &RejectReason) {
    match reason {
        RejectReason::DoiConflict {
            baseline,
            candidate,
        } => info!(source = %origin, %phase, baseline, candidate, "DOI conflict; candidate rejected"),
        other => info!(source = %origin, %phase, reason = %other, "candidate rejected"),
    }
}
