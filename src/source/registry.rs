//! The configured set of collaborators for one run.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{
    ArxivSource, CrossrefSource, DblpDiscovery, DiscoverySource, DoiOrgResolver, DoiResolver,
    EuropePmcSource, HttpFetcher, LandingPageFetcher, OpenAlexSource, OpenReviewSource,
    PageFetcher, PubmedSource, RateLimiter, ScholarCitationSource, ScholarProfileDiscovery,
    SemanticScholarSource, SourceCollaborator, SourceError, build_http_client, default_user_agent,
};
use crate::config::{ApiKeys, EngineConfig};
use crate::record::{Source, TrustOrder};

/// Base URLs of every remote API. Tests point all of them at one mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEndpoints {
    pub crossref: String,
    pub openalex: String,
    pub semantic_scholar: String,
    pub openreview: String,
    pub europepmc: String,
    pub pubmed: String,
    pub arxiv: String,
    pub serpapi: String,
    pub dblp: String,
    pub doi: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            crossref: super::crossref::DEFAULT_BASE_URL.to_string(),
            openalex: super::openalex::DEFAULT_BASE_URL.to_string(),
            semantic_scholar: super::semantic_scholar::DEFAULT_BASE_URL.to_string(),
            openreview: super::openreview::DEFAULT_BASE_URL.to_string(),
            europepmc: super::europepmc::DEFAULT_BASE_URL.to_string(),
            pubmed: super::pubmed::DEFAULT_BASE_URL.to_string(),
            arxiv: super::arxiv::DEFAULT_BASE_URL.to_string(),
            serpapi: super::scholar::DEFAULT_BASE_URL.to_string(),
            dblp: super::dblp::DEFAULT_BASE_URL.to_string(),
            doi: super::doi_resolver::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl SourceEndpoints {
    /// Every endpoint rooted at `base`.
    #[must_use]
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            crossref: base.clone(),
            openalex: base.clone(),
            semantic_scholar: base.clone(),
            openreview: base.clone(),
            europepmc: base.clone(),
            pubmed: base.clone(),
            arxiv: base.clone(),
            serpapi: base.clone(),
            dblp: base.clone(),
            doi: base,
        }
    }
}

/// Enrichment sources in fan-out order, the DOI resolver, discovery sources
/// (primary first) and the landing-page fetcher.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn SourceCollaborator>>,
    resolver: Option<Arc<dyn DoiResolver>>,
    discovery: Vec<(&'static str, Arc<dyn DiscoverySource>)>,
    page_fetcher: Option<Arc<dyn PageFetcher>>,
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<Source> = self.sources.iter().map(|source| source.source()).collect();
        let discovery: Vec<&str> = self.discovery.iter().map(|(name, _)| *name).collect();
        f.debug_struct("SourceRegistry")
            .field("sources", &sources)
            .field("resolver", &self.resolver.is_some())
            .field("discovery", &discovery)
            .field("page_fetcher", &self.page_fetcher.is_some())
            .finish()
    }
}

impl SourceRegistry {
    /// Registry with no collaborators; populate it with the `with_*` methods.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the production registry against the real APIs.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::ClientBuild`] when the HTTP client cannot be built.
    pub fn from_config(
        config: &EngineConfig,
        order: &TrustOrder,
        keys: &ApiKeys,
    ) -> Result<Self, SourceError> {
        let client = build_http_client(&default_user_agent(keys.mailto.as_deref()))?;
        let http = HttpFetcher::new(client, Arc::new(RateLimiter::default()));
        Ok(Self::build(config, order, keys, &SourceEndpoints::default(), &http))
    }

    /// Builds every collaborator on `http`, honoring `[sources]` enable flags
    /// and dropping the ones whose API key is missing.
    #[must_use]
    pub fn build(
        config: &EngineConfig,
        order: &TrustOrder,
        keys: &ApiKeys,
        endpoints: &SourceEndpoints,
        http: &HttpFetcher,
    ) -> Self {
        let mut candidates: Vec<Arc<dyn SourceCollaborator>> = vec![
            Arc::new(PubmedSource::with_base_url(http.clone(), &endpoints.pubmed)),
            Arc::new(EuropePmcSource::with_base_url(
                http.clone(),
                &endpoints.europepmc,
            )),
            Arc::new(CrossrefSource::with_base_url(
                http.clone(),
                &endpoints.crossref,
                keys.mailto.clone(),
            )),
            Arc::new(OpenAlexSource::with_base_url(
                http.clone(),
                &endpoints.openalex,
                keys.mailto.clone(),
            )),
            Arc::new(SemanticScholarSource::with_base_url(
                http.clone(),
                &endpoints.semantic_scholar,
                keys.semantic_scholar.clone(),
            )),
            Arc::new(OpenReviewSource::with_base_url(
                http.clone(),
                &endpoints.openreview,
                keys.openreview.clone(),
            )),
            Arc::new(ArxivSource::with_base_url(http.clone(), &endpoints.arxiv)),
        ];
        match keys.serpapi.as_deref() {
            Some(key) => candidates.push(Arc::new(ScholarCitationSource::with_base_url(
                http.clone(),
                &endpoints.serpapi,
                key,
            ))),
            None => warn!(
                error = %SourceError::MissingKey {
                    origin: Source::ScholarPage,
                    key: "SerpAPI.key",
                    env: "SERPAPI_KEY",
                },
                "Scholar citation pages and profile discovery disabled"
            ),
        }

        let mut registry = Self::empty();
        for source in candidates {
            if config.sources.settings_for(source.source()).enabled {
                registry = registry.with_source(source);
            } else {
                debug!(source = %source.source(), "source disabled by configuration");
            }
        }
        registry.sort_by_trust(order);

        let resolver_enabled = [Source::Csl, Source::DoiBibtex]
            .into_iter()
            .any(|tier| config.sources.settings_for(tier).enabled);
        if resolver_enabled {
            registry = registry
                .with_resolver(Arc::new(DoiOrgResolver::with_base_url(http.clone(), &endpoints.doi)));
        }
        registry = registry.with_page_fetcher(Arc::new(LandingPageFetcher::new(http.clone())));

        if let Some(key) = keys.serpapi.as_deref() {
            registry = registry.with_discovery(Arc::new(ScholarProfileDiscovery::with_base_url(
                http.clone(),
                &endpoints.serpapi,
                key,
            )));
        }
        registry.with_discovery(Arc::new(DblpDiscovery::with_base_url(
            http.clone(),
            &endpoints.dblp,
        )))
    }

    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn SourceCollaborator>) -> Self {
        self.sources.push(source);
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn DoiResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Adds a discovery source; the first one added is primary.
    #[must_use]
    pub fn with_discovery(mut self, discovery: Arc<dyn DiscoverySource>) -> Self {
        self.discovery.push((discovery.name(), discovery));
        self
    }

    #[must_use]
    pub fn with_page_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.page_fetcher = Some(fetcher);
        self
    }

    /// Stable sort of the enrichment sources, most trusted first.
    pub fn sort_by_trust(&mut self, order: &TrustOrder) {
        self.sources.sort_by_key(|source| order.rank(source.source()));
    }

    #[must_use]
    pub fn sources(&self) -> &[Arc<dyn SourceCollaborator>] {
        &self.sources
    }

    #[must_use]
    pub fn resolver(&self) -> Option<&Arc<dyn DoiResolver>> {
        self.resolver.as_ref()
    }

    pub fn discovery(&self) -> impl Iterator<Item = &Arc<dyn DiscoverySource>> {
        self.discovery.iter().map(|(_, discovery)| discovery)
    }

    #[must_use]
    pub fn page_fetcher(&self) -> Option<&Arc<dyn PageFetcher>> {
        self.page_fetcher.as_ref()
    }
}
