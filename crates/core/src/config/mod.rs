//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PAGEMETA_*)
//! 2. TOML config file (if PAGEMETA_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Every nested section carries serde defaults, so a missing or partial
//! section degrades to the permissive default instead of failing to load.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PAGEMETA_*)
/// 2. TOML config file (if PAGEMETA_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding pages, aliases and cache entries.
    ///
    /// Set via PAGEMETA_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Query parameters that take part in the query hash. Everything else is ignored.
    #[serde(default = "default_query_whitelist")]
    pub query_whitelist: Vec<String>,

    /// Lifetime of cached database-backed documents.
    ///
    /// Set via PAGEMETA_CACHE_TTL_MINUTES environment variable.
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: u64,

    /// Emit debug comments and conflict warnings into rendered pages.
    ///
    /// Set via PAGEMETA_DEBUG environment variable.
    #[serde(default)]
    pub debug: bool,

    /// Site-wide defaults used when no page record exists.
    #[serde(default)]
    pub default: SiteDefaults,

    /// Indexability rules for query-string variants.
    #[serde(default)]
    pub indexing: IndexingPolicyConfig,

    /// Duplicate-tag stripping on finished HTML responses.
    #[serde(default)]
    pub conflict_guard: ConflictGuardConfig,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./pagemeta.sqlite")
}

fn default_query_whitelist() -> Vec<String> {
    ["city", "district", "uni", "gender", "price_min", "price_max", "type", "page"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cache_ttl_minutes() -> u64 {
    360
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            query_whitelist: default_query_whitelist(),
            cache_ttl_minutes: default_cache_ttl_minutes(),
            debug: false,
            default: SiteDefaults::default(),
            indexing: IndexingPolicyConfig::default(),
            conflict_guard: ConflictGuardConfig::default(),
        }
    }
}

impl AppConfig {
    /// Cache TTL as Duration. Saturates instead of overflowing.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PAGEMETA_`
    /// 2. TOML file from `PAGEMETA_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PAGEMETA_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PAGEMETA_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate a configuration from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

/// Site-wide defaults for synthesized documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDefaults {
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Appended to the site name to form the fallback title.
    #[serde(default = "default_title_suffix")]
    pub title_suffix: String,

    /// Fallback description; the site name is used when unset.
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_image")]
    pub default_image: String,

    /// Robots directive for indexable pages.
    #[serde(default = "default_robots")]
    pub default_robots: String,

    #[serde(default = "default_twitter_card")]
    pub twitter_card: String,

    /// Site-wide `twitter:site` handle.
    #[serde(default)]
    pub twitter_site: Option<String>,

    /// Site-wide content language.
    #[serde(default)]
    pub language: Option<String>,
}

fn default_site_name() -> String {
    "pagemeta".into()
}

fn default_title_suffix() -> String {
    String::new()
}

fn default_image() -> String {
    "/images/og-default.jpg".into()
}

fn default_robots() -> String {
    "index, follow".into()
}

fn default_twitter_card() -> String {
    "summary_large_image".into()
}

impl Default for SiteDefaults {
    fn default() -> Self {
        Self {
            site_name: default_site_name(),
            title_suffix: default_title_suffix(),
            description: None,
            default_image: default_image(),
            default_robots: default_robots(),
            twitter_card: default_twitter_card(),
            twitter_site: None,
            language: None,
        }
    }
}

/// How the allow/deny pattern lists are applied.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexingStrategy {
    /// Indexable only when at least one allow pattern matches.
    Allowlist,
    /// Indexable unless some deny pattern matches.
    #[default]
    Denylist,
}

/// Where the canonical URL of a paginated page points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalStrategy {
    /// Strip the pagination parameter (canonical is the first page).
    #[default]
    Base,
    /// Keep the pagination parameter (each page is its own canonical).
    #[serde(rename = "self")]
    SelfPage,
}

/// Pagination handling inside the indexing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_pagination_param")]
    pub param: String,

    /// Whether paginated variants may be indexed at all.
    #[serde(default)]
    pub indexable: bool,

    #[serde(default)]
    pub canonical_strategy: CanonicalStrategy,
}

fn default_pagination_param() -> String {
    "page".into()
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { param: default_pagination_param(), indexable: false, canonical_strategy: CanonicalStrategy::Base }
    }
}

/// Indexability rules evaluated over the normalized query.
///
/// Patterns are lists of tokens, each `key` (presence) or `key=value` (exact match).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingPolicyConfig {
    #[serde(default)]
    pub strategy: IndexingStrategy,

    #[serde(default)]
    pub allowlist: Vec<Vec<String>>,

    #[serde(default)]
    pub denylist: Vec<Vec<String>>,

    #[serde(default)]
    pub pagination: PaginationConfig,

    /// More normalized parameters than this makes a variant non-indexable.
    #[serde(default)]
    pub max_params: Option<usize>,

    /// A query whose key set is exactly this set is non-indexable (e.g. sort + order).
    #[serde(default)]
    pub alone_non_indexable: Vec<String>,

    /// Robots directive for non-indexable variants.
    #[serde(default = "default_noindex_robots")]
    pub noindex_robots: String,
}

fn default_noindex_robots() -> String {
    "noindex, follow".into()
}

impl Default for IndexingPolicyConfig {
    fn default() -> Self {
        Self {
            strategy: IndexingStrategy::Denylist,
            allowlist: Vec::new(),
            denylist: Vec::new(),
            pagination: PaginationConfig::default(),
            max_params: None,
            alone_non_indexable: Vec::new(),
            noindex_robots: default_noindex_robots(),
        }
    }
}

/// Conflict guard settings.
///
/// Accepts either a table or a bare boolean (`conflict_guard = false`), the
/// latter kept for older configuration files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "ConflictGuardSetting")]
pub struct ConflictGuardConfig {
    pub enabled: bool,

    /// Responses larger than this are passed through untouched. 0 disables the limit.
    pub max_size_kb: usize,

    /// Only scan the `<head>` element.
    pub parse_head_only: bool,

    /// Media types the guard processes; parameters such as charset are ignored.
    pub content_types: Vec<String>,
}

impl Default for ConflictGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_kb: default_max_size_kb(),
            parse_head_only: true,
            content_types: default_content_types(),
        }
    }
}

fn default_max_size_kb() -> usize {
    512
}

fn default_content_types() -> Vec<String> {
    vec!["text/html".into()]
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConflictGuardSetting {
    Toggle(bool),
    Table(ConflictGuardTable),
}

#[derive(Deserialize)]
struct ConflictGuardTable {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_max_size_kb")]
    max_size_kb: usize,
    #[serde(default = "default_true")]
    parse_head_only: bool,
    #[serde(default = "default_content_types")]
    content_types: Vec<String>,
}

impl From<ConflictGuardSetting> for ConflictGuardConfig {
    fn from(setting: ConflictGuardSetting) -> Self {
        match setting {
            ConflictGuardSetting::Toggle(enabled) => Self { enabled, ..Self::default() },
            ConflictGuardSetting::Table(t) => Self {
                enabled: t.enabled,
                max_size_kb: t.max_size_kb,
                parse_head_only: t.parse_head_only,
                content_types: t.content_types,
            },
        }
    }
}
