//! Request-to-identity resolution.
//!
//! A request maps to a `(domain, path, query_hash)` identity and a cache key
//! derived from it. [`generate_cache_key`] is the only place a cache key is
//! built, so lookups and invalidation can never disagree.

use std::collections::{BTreeMap, BTreeSet};

use pagemeta_core::{Error, PageIdentity};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Whitelisted, non-empty query parameters sorted by key.
pub type NormalizedQuery = BTreeMap<String, String>;

/// Error type for turning a URL into a page request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<RequestError> for Error {
    fn from(err: RequestError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

/// The parts of an inbound request that identity resolution looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub secure: bool,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    /// Raw query pairs in arrival order.
    pub query: Vec<(String, String)>,
}

impl PageRequest {
    /// An https request for `host` and `path` with no query.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self { secure: true, host: host.into(), port: None, path: path.into(), query: Vec::new() }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn insecure(mut self) -> Self {
        self.secure = false;
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }

    /// Parse an absolute URL into a page request.
    ///
    /// Whitespace is trimmed, a missing scheme defaults to https, the host is
    /// lowercased and the fragment is dropped. The path is kept percent-encoded.
    pub fn parse(input: &str) -> Result<Self, RequestError> {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Err(RequestError::Empty);
        }

        let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

        let parsed = url::Url::parse(&url_str).map_err(|e| RequestError::InvalidUrl(e.to_string()))?;
        Self::from_url(&parsed, trimmed)
    }

    /// A request for a stored `domain` (optionally `host:port`) and `path`.
    ///
    /// Both parts go through the same URL canonicalization as [`PageRequest::parse`]:
    /// unicode hosts become punycode and the path is percent-encoded, so a
    /// record saved under these parts is found by a request for the same page.
    pub fn from_parts(domain: &str, path: &str) -> Result<Self, RequestError> {
        let domain = domain.trim();

        if domain.is_empty() {
            return Err(RequestError::MissingHost(domain.to_string()));
        }

        let mut parsed =
            url::Url::parse(&format!("https://{domain}")).map_err(|e| RequestError::InvalidUrl(e.to_string()))?;

        if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() || !parsed.username().is_empty()
        {
            return Err(RequestError::InvalidUrl(format!("not a bare domain: {domain}")));
        }

        parsed.set_path(path.trim());
        Self::from_url(&parsed, domain)
    }

    fn from_url(parsed: &url::Url, input: &str) -> Result<Self, RequestError> {
        let secure = match parsed.scheme() {
            "https" => true,
            "http" => false,
            scheme => return Err(RequestError::UnsupportedScheme(scheme.to_string())),
        };

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RequestError::MissingHost(input.to_string()))?
            .to_lowercase();

        let query = parsed.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();

        Ok(Self { secure, host, port: parsed.port(), path: parsed.path().to_string(), query })
    }
}

/// Derived identity of a request. Recomputed per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct QueryIdentity {
    pub domain: String,
    pub path: String,
    pub query_hash: Option<String>,
    pub cache_key: String,
}

impl QueryIdentity {
    pub fn page_identity(&self) -> PageIdentity {
        PageIdentity::new(self.domain.clone(), self.path.clone(), self.query_hash.clone())
    }
}

/// Maps requests to stable identities using a query-parameter whitelist.
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    whitelist: BTreeSet<String>,
}

impl KeyResolver {
    pub fn new<I, S>(whitelist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { whitelist: whitelist.into_iter().map(Into::into).collect() }
    }

    /// Host, plus `:port` when a non-standard port is present.
    pub fn resolve_domain(&self, request: &PageRequest) -> String {
        let host = request.host.to_lowercase();
        match request.port {
            Some(port) if port != 80 && port != 443 => format!("{host}:{port}"),
            _ => host,
        }
    }

    /// Path with exactly one leading slash; empty becomes `/`.
    pub fn resolve_path(&self, request: &PageRequest) -> String {
        format!("/{}", request.path.trim_start_matches('/'))
    }

    /// Whitelisted parameters with non-empty values, sorted by key.
    ///
    /// A repeated key keeps its last value.
    pub fn normalize_query(&self, request: &PageRequest) -> NormalizedQuery {
        request
            .query
            .iter()
            .filter(|(key, value)| !value.is_empty() && self.whitelist.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// SHA-1 of the canonical query string, or None when nothing survives normalization.
    pub fn resolve_query_hash(&self, request: &PageRequest) -> Option<String> {
        hash_query(&self.normalize_query(request))
    }

    /// Identity of a request whose query has already been normalized.
    pub fn identity(&self, request: &PageRequest, query: &NormalizedQuery) -> QueryIdentity {
        let domain = self.resolve_domain(request);
        let path = self.resolve_path(request);
        let query_hash = hash_query(query);
        let cache_key = generate_cache_key(&domain, &path, query_hash.as_deref());
        QueryIdentity { domain, path, query_hash, cache_key }
    }

    pub fn resolve(&self, request: &PageRequest) -> QueryIdentity {
        self.identity(request, &self.normalize_query(request))
    }
}

/// `key=value&...` form-urlencoded in key order.
pub fn canonical_query_string(query: &NormalizedQuery) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.iter())
        .finish()
}

pub fn hash_query(query: &NormalizedQuery) -> Option<String> {
    if query.is_empty() {
        return None;
    }
    let digest = Sha1::digest(canonical_query_string(query).as_bytes());
    Some(hex::encode(digest))
}

/// Cache key for an identity: `meta:{domain}:{path}:{query_hash|noq}`.
pub fn generate_cache_key(domain: &str, path: &str, query_hash: Option<&str>) -> String {
    format!("meta:{domain}:{path}:{}", query_hash.unwrap_or("noq"))
}
