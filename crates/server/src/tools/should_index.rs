//! meta_should_index tool implementation.
//!
//! Evaluates the indexing policy for a URL without resolving metadata.

use pagemeta_core::Error;
use pagemeta_engine::{IndexReason, PageRequest};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::AppState;

/// Input parameters for the meta_should_index tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShouldIndexParams {
    /// Absolute URL of the page, including its query string.
    pub url: String,
}

/// Output structure for the meta_should_index tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShouldIndexOutput {
    pub indexable: bool,
    /// Rule that produced the decision.
    pub reason: IndexReason,
    /// Robots directive the policy implies.
    pub robots: String,
    /// Canonical URL the policy implies.
    pub canonical_url: String,
    pub query_hash: Option<String>,
}

/// Implementation of the meta_should_index tool.
pub async fn should_index_impl(state: &AppState, params: ShouldIndexParams) -> Result<CallToolResult, McpError> {
    let request = PageRequest::parse(&params.url).map_err(Error::from)?;
    let engine = &state.engine;

    let identity = engine.identity(&request);
    let decision = engine.index_decision(&request);

    let output = ShouldIndexOutput {
        indexable: decision.indexable,
        reason: decision.reason,
        robots: engine.robots(&decision).to_string(),
        canonical_url: engine.canonical_url(&request, &identity, &decision),
        query_hash: identity.query_hash,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_output;
    use pagemeta_core::AppConfig;
    use pagemeta_core::config::IndexingPolicyConfig;

    async fn check(state: &AppState, url: &str) -> ShouldIndexOutput {
        let result = should_index_impl(state, ShouldIndexParams { url: url.to_string() }).await.unwrap();
        parse_output(&result)
    }

    #[tokio::test]
    async fn test_denylist_combination() {
        let mut config = AppConfig::default();
        config.indexing =
            IndexingPolicyConfig { denylist: vec![vec!["city".into(), "district".into()]], ..Default::default() };
        let state = AppState::in_memory(config).await.unwrap();

        let blocked = check(&state, "https://example.com/rooms?city=istanbul&district=kadikoy").await;
        assert!(!blocked.indexable);
        assert_eq!(blocked.reason, IndexReason::DenyMatch);
        assert_eq!(blocked.robots, "noindex, follow");

        let allowed = check(&state, "https://example.com/rooms?city=istanbul").await;
        assert!(allowed.indexable);
        assert_eq!(allowed.robots, "index, follow");
        assert_eq!(allowed.canonical_url, "https://example.com/rooms?city=istanbul");
    }

    #[tokio::test]
    async fn test_paginated_canonical() {
        let state = AppState::in_memory(AppConfig::default()).await.unwrap();
        let output = check(&state, "http://localhost:8000/rooms?page=2&utm_source=x").await;

        assert!(!output.indexable);
        assert_eq!(output.reason, IndexReason::Paginated);
        assert_eq!(output.canonical_url, "http://localhost:8000/rooms");
        assert!(output.query_hash.is_some());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let state = AppState::in_memory(AppConfig::default()).await.unwrap();
        let result = should_index_impl(&state, ShouldIndexParams { url: String::new() }).await;
        assert_eq!(result.unwrap_err().code.0, -32602);
    }
}
