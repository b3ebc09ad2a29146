//! cache_purge tool implementation.
//!
//! Forgets the cached document for one identity, given either a URL or an
//! explicit `(domain, path, query_hash)` triple, and optionally sweeps
//! expired entries.

use pagemeta_core::{Error, PageIdentity};
use pagemeta_engine::PageRequest;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;
use crate::state::AppState;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// URL whose cache entry should be forgotten.
    #[serde(default)]
    pub url: Option<String>,

    /// Stored domain, used together with `path` instead of `url`.
    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub query_hash: Option<String>,

    /// Also delete every expired cache entry.
    #[serde(default)]
    pub expired: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Key that was forgotten, if one was targeted.
    pub cache_key: Option<String>,
    /// Number of expired entries deleted.
    pub expired_deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(state: &AppState, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let target = match (&params.url, &params.domain, &params.path) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            return Err(ToolError::InvalidParams("pass either url or domain and path, not both".to_string()).into());
        }
        (Some(url), None, None) => {
            let request = PageRequest::parse(url).map_err(Error::from)?;
            Some(state.engine.identity(&request).page_identity())
        }
        (None, Some(domain), Some(path)) => {
            let request = PageRequest::from_parts(domain, path).map_err(Error::from)?;
            let keys = state.engine.keys();
            let (domain, path) = (keys.resolve_domain(&request), keys.resolve_path(&request));
            Some(PageIdentity::new(domain, path, params.query_hash.clone()))
        }
        (None, Some(_), None) | (None, None, Some(_)) => {
            return Err(ToolError::InvalidParams("domain and path must be given together".to_string()).into());
        }
        (None, None, None) => None,
    };

    if target.is_none() && !params.expired {
        return Err(ToolError::InvalidParams("url, domain and path, or expired must be specified".to_string()).into());
    }

    let cache_key = match target {
        Some(identity) => Some(
            state
                .engine
                .purge_cache(&identity.domain, &identity.path, identity.query_hash.as_deref())
                .await?,
        ),
        None => None,
    };

    let expired_deleted = if params.expired { state.db.purge_expired_entries().await? } else { 0 };

    json_result(&CachePurgeOutput { cache_key, expired_deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_output;
    use pagemeta_core::AppConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn test_purge_by_url() {
        let state = AppState::in_memory(AppConfig::default()).await.unwrap();
        let key = "meta:example.com:/rooms:noq";
        state.db.put_entry(key, b"{}", Duration::from_secs(60)).await.unwrap();

        let params = CachePurgeParams {
            url: Some("https://example.com/rooms?utm_source=x".to_string()),
            ..Default::default()
        };
        let output: CachePurgeOutput = parse_output(&purge_impl(&state, params).await.unwrap());

        assert_eq!(output.cache_key.as_deref(), Some(key));
        assert!(state.db.get_entry(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_by_identity() {
        let state = AppState::in_memory(AppConfig::default()).await.unwrap();
        let key = "meta:example.com:/rooms:abc";
        state.db.put_entry(key, b"{}", Duration::from_secs(60)).await.unwrap();

        let params = CachePurgeParams {
            domain: Some("example.com".to_string()),
            path: Some("/rooms".to_string()),
            query_hash: Some("abc".to_string()),
            ..Default::default()
        };
        let output: CachePurgeOutput = parse_output(&purge_impl(&state, params).await.unwrap());

        assert_eq!(output.cache_key.as_deref(), Some(key));
        assert!(state.db.get_entry(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_by_unicode_identity() {
        let state = AppState::in_memory(AppConfig::default()).await.unwrap();
        let key = "meta:example.com:/%C5%9Fehir:noq";
        state.db.put_entry(key, b"{}", Duration::from_secs(60)).await.unwrap();

        let params = CachePurgeParams {
            domain: Some("Example.com".to_string()),
            path: Some("/şehir".to_string()),
            ..Default::default()
        };
        let output: CachePurgeOutput = parse_output(&purge_impl(&state, params).await.unwrap());

        assert_eq!(output.cache_key.as_deref(), Some(key));
        assert!(state.db.get_entry(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let state = AppState::in_memory(AppConfig::default()).await.unwrap();
        state.db.put_entry("stale", b"{}", Duration::ZERO).await.unwrap();

        let params = CachePurgeParams { expired: true, ..Default::default() };
        let output: CachePurgeOutput = parse_output(&purge_impl(&state, params).await.unwrap());

        assert_eq!(output.cache_key, None);
        assert_eq!(output.expired_deleted, 1);
    }

    #[tokio::test]
    async fn test_purge_requires_target() {
        let state = AppState::in_memory(AppConfig::default()).await.unwrap();
        assert!(purge_impl(&state, CachePurgeParams::default()).await.is_err());

        let params = CachePurgeParams { domain: Some("example.com".to_string()), ..Default::default() };
        assert!(purge_impl(&state, params).await.is_err());

        let params = CachePurgeParams {
            url: Some("https://example.com/".to_string()),
            domain: Some("example.com".to_string()),
            ..Default::default()
        };
        assert!(purge_impl(&state, params).await.is_err());
    }
}
