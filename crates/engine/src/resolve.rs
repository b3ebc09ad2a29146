//! Cache-aside metadata resolution.
//!
//! A resolution moves through one of three paths:
//!
//! - cache hit: the cached document is returned
//! - cache miss, record found: the record is merged with policy-derived
//!   canonical and robots values and cached for the configured TTL
//! - cache miss, no record: a fallback document is built from the site
//!   defaults and never cached
//!
//! Staged overrides bypass the cache in both directions. Cache failures
//! degrade to a miss; store failures are returned to the caller.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pagemeta_core::config::SiteDefaults;
use pagemeta_core::{AppConfig, CacheStore, Error, MetadataStore, PageIdentity, PageRecord};
use serde::{Deserialize, Serialize};

use crate::jsonld::{JsonLdItem, default_json_ld, normalize_json_ld};
use crate::key::{KeyResolver, NormalizedQuery, PageRequest, QueryIdentity, canonical_query_string, generate_cache_key};
use crate::metadata::{MetaField, MetaOverrides, ResolvedMetadata};
use crate::policy::{IndexDecision, IndexingPolicy};
use crate::render;

const OG_TYPE: &str = "website";

/// Where a resolved document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Cache,
    Database,
    Fallback,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::Cache => f.write_str("cache"),
            ResolutionSource::Database => f.write_str("database"),
            ResolutionSource::Fallback => f.write_str("fallback"),
        }
    }
}

/// Output of one resolution call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Resolution {
    pub identity: QueryIdentity,
    pub source: ResolutionSource,
    pub decision: IndexDecision,
    pub metadata: ResolvedMetadata,
}

/// Resolves requests to metadata documents.
///
/// Holds no per-request state; overrides travel with each call or live in a
/// [`MetaContext`].
#[derive(Clone)]
pub struct ResolutionEngine {
    keys: KeyResolver,
    policy: IndexingPolicy,
    defaults: SiteDefaults,
    cache_ttl: Duration,
    debug: bool,
    store: Arc<dyn MetadataStore>,
    cache: Arc<dyn CacheStore>,
}

impl ResolutionEngine {
    pub fn new(config: &AppConfig, store: Arc<dyn MetadataStore>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            keys: KeyResolver::new(config.query_whitelist.iter().cloned()),
            policy: IndexingPolicy::new(&config.indexing),
            defaults: config.default.clone(),
            cache_ttl: config.cache_ttl(),
            debug: config.debug,
            store,
            cache,
        }
    }

    pub fn keys(&self) -> &KeyResolver {
        &self.keys
    }

    pub fn policy(&self) -> &IndexingPolicy {
        &self.policy
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Start a request-scoped context.
    pub fn context(&self, request: PageRequest) -> MetaContext<'_> {
        MetaContext { engine: self, request, overrides: MetaOverrides::default(), resolved: None }
    }

    pub fn identity(&self, request: &PageRequest) -> QueryIdentity {
        self.keys.resolve(request)
    }

    pub fn index_decision(&self, request: &PageRequest) -> IndexDecision {
        self.policy.evaluate(&self.keys.normalize_query(request))
    }

    /// Indexability of a request without resolving its metadata.
    pub fn should_index(&self, request: &PageRequest) -> bool {
        self.index_decision(request).indexable
    }

    /// `{scheme}://{domain}{path}` plus the decision's canonical query.
    pub fn canonical_url(&self, request: &PageRequest, identity: &QueryIdentity, decision: &IndexDecision) -> String {
        let mut url = format!("{}://{}{}", request.scheme(), identity.domain, identity.path);
        if !decision.canonical_query.is_empty() {
            url.push('?');
            url.push_str(&canonical_query_string(&decision.canonical_query));
        }
        url
    }

    pub fn robots<'a>(&'a self, decision: &IndexDecision) -> &'a str {
        if decision.indexable { &self.defaults.default_robots } else { self.policy.noindex_robots() }
    }

    pub async fn resolve(&self, request: &PageRequest) -> Result<Resolution, Error> {
        self.resolve_with(request, &MetaOverrides::default()).await
    }

    /// Resolve a request and merge `overrides` on top.
    pub async fn resolve_with(&self, request: &PageRequest, overrides: &MetaOverrides) -> Result<Resolution, Error> {
        let query: NormalizedQuery = self.keys.normalize_query(request);
        let identity = self.keys.identity(request, &query);
        let decision = self.policy.evaluate(&query);
        let bypass_cache = !overrides.is_empty();

        let cached = if bypass_cache {
            tracing::debug!(cache_key = %identity.cache_key, "Overrides staged, bypassing cache");
            None
        } else {
            self.read_cache(&identity.cache_key).await
        };

        let (mut metadata, source) = match cached {
            Some(metadata) => {
                tracing::debug!(cache_key = %identity.cache_key, "Cache hit");
                (metadata, ResolutionSource::Cache)
            }
            None => {
                let record = self
                    .store
                    .find_active(&identity.domain, &identity.path, identity.query_hash.as_deref())
                    .await?;

                match record {
                    Some(record) => {
                        tracing::debug!(domain = %identity.domain, path = %identity.path, page_id = record.id, "Database hit");
                        let metadata = self.from_record(&record, request, &identity, &decision);
                        if !bypass_cache {
                            self.write_cache(&identity.cache_key, &metadata).await;
                        }
                        (metadata, ResolutionSource::Database)
                    }
                    None => {
                        tracing::debug!(domain = %identity.domain, path = %identity.path, "No record, using fallback");
                        (self.fallback(request, &identity, &decision), ResolutionSource::Fallback)
                    }
                }
            }
        };

        overrides.apply(&mut metadata);

        Ok(Resolution { identity, source, decision, metadata })
    }

    fn from_record(
        &self, record: &PageRecord, request: &PageRequest, identity: &QueryIdentity, decision: &IndexDecision,
    ) -> ResolvedMetadata {
        let mut metadata = ResolvedMetadata::from_content(&record.content);
        metadata.fill(MetaField::CanonicalUrl, self.canonical_url(request, identity, decision));
        metadata.fill(MetaField::Robots, self.robots(decision));
        metadata.fill(MetaField::OgType, OG_TYPE);
        metadata.jsonld = normalize_json_ld(record.content.jsonld.as_ref(), record.content.breadcrumb_jsonld.as_ref());
        metadata.updated_at = Some(record.updated_at.clone());
        metadata
    }

    fn fallback(&self, request: &PageRequest, identity: &QueryIdentity, decision: &IndexDecision) -> ResolvedMetadata {
        let defaults = &self.defaults;
        let title = format!("{}{}", defaults.site_name, defaults.title_suffix);
        let description = defaults.description.clone().unwrap_or_else(|| title.clone());
        let base_url = format!("{}://{}", request.scheme(), identity.domain);

        ResolvedMetadata {
            title: Some(title),
            description: Some(description.clone()),
            keywords: None,
            robots: Some(self.robots(decision).to_string()),
            language: defaults.language.clone(),
            canonical_url: Some(self.canonical_url(request, identity, decision)),
            og_title: Some(defaults.site_name.clone()),
            og_description: Some(description.clone()),
            og_image: Some(defaults.default_image.clone()),
            og_type: Some(OG_TYPE.to_string()),
            og_site_name: Some(defaults.site_name.clone()),
            twitter_card: Some(defaults.twitter_card.clone()),
            twitter_title: Some(defaults.site_name.clone()),
            twitter_description: Some(description),
            twitter_image: Some(defaults.default_image.clone()),
            twitter_site: defaults.twitter_site.clone(),
            twitter_creator: None,
            author: None,
            theme_color: None,
            jsonld: default_json_ld(&defaults.site_name, &base_url),
            updated_at: None,
        }
    }

    async fn read_cache(&self, cache_key: &str) -> Option<ResolvedMetadata> {
        match self.cache.get(cache_key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    tracing::warn!(cache_key, error = %e, "Undecodable cache entry, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(cache_key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn write_cache(&self, cache_key: &str, metadata: &ResolvedMetadata) {
        let bytes = match serde_json::to_vec(metadata) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(cache_key, error = %e, "Failed to encode metadata for cache");
                return;
            }
        };
        if let Err(e) = self.cache.put(cache_key, &bytes, self.cache_ttl).await {
            tracing::warn!(cache_key, error = %e, "Cache write failed");
        }
    }

    /// Forget the cached document for one identity.
    pub async fn purge_cache(&self, domain: &str, path: &str, query_hash: Option<&str>) -> Result<String, Error> {
        let cache_key = generate_cache_key(domain, path, query_hash);
        self.cache.forget(&cache_key).await?;
        tracing::debug!(cache_key = %cache_key, "Purged cache entry");
        Ok(cache_key)
    }

    /// Purge the key of every distinct identity a write touched.
    ///
    /// Pass both the identity before a change and after it. Failures are
    /// logged; the keys that were purged are returned.
    pub async fn invalidate<'a, I>(&self, identities: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a PageIdentity>,
    {
        let mut seen: Vec<&PageIdentity> = Vec::new();
        let mut purged = Vec::new();

        for identity in identities {
            if seen.contains(&identity) {
                continue;
            }
            seen.push(identity);

            match self.purge_cache(&identity.domain, &identity.path, identity.query_hash.as_deref()).await {
                Ok(cache_key) => purged.push(cache_key),
                Err(e) => tracing::warn!(%identity, error = %e, "Cache invalidation failed"),
            }
        }

        purged
    }
}

/// Request-scoped resolution state: the request, its staged overrides and
/// the memoized result.
///
/// Each request gets its own context so overrides never reach another
/// request. Changing an override drops the memoized result.
pub struct MetaContext<'e> {
    engine: &'e ResolutionEngine,
    request: PageRequest,
    overrides: MetaOverrides,
    resolved: Option<Resolution>,
}

impl MetaContext<'_> {
    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub fn overrides(&self) -> &MetaOverrides {
        &self.overrides
    }

    pub fn identity(&self) -> QueryIdentity {
        self.engine.identity(&self.request)
    }

    pub fn should_index(&self) -> bool {
        self.engine.should_index(&self.request)
    }

    fn stage(&mut self, apply: impl FnOnce(&mut MetaOverrides)) -> &mut Self {
        apply(&mut self.overrides);
        self.resolved = None;
        self
    }

    pub fn set(&mut self, field: MetaField, value: impl Into<String>) -> &mut Self {
        self.stage(|o| {
            o.set(field, value);
        })
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.set(MetaField::Title, title)
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.set(MetaField::Description, description)
    }

    pub fn set_canonical(&mut self, url: impl Into<String>) -> &mut Self {
        self.set(MetaField::CanonicalUrl, url)
    }

    pub fn set_robots(&mut self, robots: impl Into<String>) -> &mut Self {
        self.set(MetaField::Robots, robots)
    }

    pub fn set_og_image(&mut self, url: impl Into<String>) -> &mut Self {
        self.set(MetaField::OgImage, url)
    }

    pub fn add_json_ld(&mut self, item: JsonLdItem) -> &mut Self {
        self.stage(|o| {
            o.add_json_ld(item);
        })
    }

    pub fn replace_json_ld(&mut self, items: Vec<JsonLdItem>) -> &mut Self {
        self.stage(|o| {
            o.replace_json_ld(items);
        })
    }

    /// Resolve once and reuse the result until an override changes.
    pub async fn resolve(&mut self) -> Result<&Resolution, Error> {
        let resolution = match self.resolved.take() {
            Some(resolution) => resolution,
            None => self.engine.resolve_with(&self.request, &self.overrides).await?,
        };
        Ok(self.resolved.insert(resolution))
    }

    pub async fn metadata(&mut self) -> Result<&ResolvedMetadata, Error> {
        Ok(&self.resolve().await?.metadata)
    }

    pub async fn render(&mut self) -> Result<String, Error> {
        Ok(render::render_head(&self.resolve().await?.metadata))
    }

    /// Render head tags not already present in `existing`.
    pub async fn render_into(&mut self, existing: &str) -> Result<String, Error> {
        Ok(render::render_head_into(&self.resolve().await?.metadata, existing))
    }

    pub async fn render_json_ld(&mut self) -> Result<String, Error> {
        Ok(render::render_json_ld(&self.resolve().await?.metadata))
    }

    /// Debug comment, or an empty string when debug output is off.
    pub async fn render_debug(&mut self) -> Result<String, Error> {
        if !self.engine.debug {
            return Ok(String::new());
        }
        let resolution = self.resolve().await?;
        Ok(render::render_debug(&resolution.identity, &resolution.metadata, resolution.source))
    }
}
