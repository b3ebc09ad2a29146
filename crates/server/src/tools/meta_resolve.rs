//! meta_resolve tool implementation.
//!
//! Resolves the metadata document for a URL and renders its head markup.

use std::collections::BTreeMap;

use pagemeta_core::Error;
use pagemeta_engine::{IndexDecision, MetaField, PageRequest, QueryIdentity, ResolutionSource, ResolvedMetadata};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;
use crate::state::AppState;

/// Input parameters for the meta_resolve tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MetaResolveParams {
    /// Absolute URL of the page, including its query string.
    pub url: String,

    /// Field overrides for this call only, e.g. `{"title": "..."}`.
    /// Keys are metadata field names (`canonical` is accepted for `canonical_url`).
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,

    /// Structured-data objects appended after the resolved JSON-LD.
    #[serde(default)]
    pub add_jsonld: Vec<serde_json::Value>,

    /// Head markup already emitted by the page template.
    /// Tags of families found here are not rendered again.
    #[serde(default)]
    pub existing_head: Option<String>,
}

/// Output structure for the meta_resolve tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MetaResolveOutput {
    pub identity: QueryIdentity,
    pub source: ResolutionSource,
    pub decision: IndexDecision,
    pub metadata: ResolvedMetadata,
    /// Rendered head tags.
    pub head: String,
    /// Rendered JSON-LD script blocks.
    pub jsonld: String,
    /// Debug comment, present only in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

/// Implementation of the meta_resolve tool.
pub async fn resolve_impl(state: &AppState, params: MetaResolveParams) -> Result<CallToolResult, McpError> {
    let request = PageRequest::parse(&params.url).map_err(Error::from)?;
    let mut context = state.engine.context(request);

    for (name, value) in params.overrides {
        let field: MetaField = name.parse()?;
        context.set(field, value);
    }

    for item in params.add_jsonld {
        match item {
            serde_json::Value::Object(map) => {
                context.add_json_ld(map);
            }
            other => {
                return Err(ToolError::InvalidParams(format!("add_jsonld entries must be objects, got {other}")).into());
            }
        }
    }

    let resolution = context.resolve().await?.clone();
    let head = match params.existing_head.as_deref() {
        Some(existing) => context.render_into(existing).await?,
        None => context.render().await?,
    };
    let jsonld = context.render_json_ld().await?;
    let debug = Some(context.render_debug().await?).filter(|d| !d.is_empty());

    let output = MetaResolveOutput {
        identity: resolution.identity,
        source: resolution.source,
        decision: resolution.decision,
        metadata: resolution.metadata,
        head,
        jsonld,
        debug,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::parse_output;
    use pagemeta_core::store::PageDraft;
    use pagemeta_core::{AppConfig, PageContent};

    fn params(url: &str) -> MetaResolveParams {
        MetaResolveParams { url: url.to_string(), ..Default::default() }
    }

    #[tokio::test]
    async fn test_resolve_fallback() {
        let state = AppState::in_memory(AppConfig::default()).await.unwrap();
        let result = resolve_impl(&state, params("https://example.com/rooms?utm_source=x")).await.unwrap();
        let output: MetaResolveOutput = parse_output(&result);

        assert_eq!(output.source, ResolutionSource::Fallback);
        assert_eq!(output.identity.cache_key, "meta:example.com:/rooms:noq");
        assert!(output.head.contains(r#"<link rel="canonical" href="https://example.com/rooms">"#));
        assert_eq!(output.jsonld.matches("application/ld+json").count(), 3);
        assert!(output.debug.is_none());
    }

    #[tokio::test]
    async fn test_resolve_stored_page_with_overrides() {
        let state = AppState::in_memory(AppConfig::default()).await.unwrap();
        let draft = PageDraft {
            domain: "example.com".into(),
            path: "/rooms".into(),
            content: PageContent { title: Some("Stored".into()), ..Default::default() },
            ..Default::default()
        };
        state.db.insert_page(&draft, None).await.unwrap();

        let mut p = params("https://example.com/rooms");
        p.overrides.insert("canonical".into(), "https://example.com/custom".into());
        p.add_jsonld.push(serde_json::json!({"@type": "Event"}));

        let output: MetaResolveOutput = parse_output(&resolve_impl(&state, p).await.unwrap());
        assert_eq!(output.source, ResolutionSource::Database);
        assert_eq!(output.metadata.title.as_deref(), Some("Stored"));
        assert_eq!(output.metadata.canonical_url.as_deref(), Some("https://example.com/custom"));
        assert!(output.jsonld.contains("Event"));
        assert!(state.db.get_entry(&output.identity.cache_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_existing_head() {
        let state = AppState::in_memory(AppConfig::default()).await.unwrap();
        let mut p = params("https://example.com/");
        p.existing_head = Some("<title>Layout</title>".into());

        let output: MetaResolveOutput = parse_output(&resolve_impl(&state, p).await.unwrap());
        assert!(!output.head.contains("<title>"));
    }

    #[tokio::test]
    async fn test_resolve_debug_comment() {
        let config = AppConfig { debug: true, ..Default::default() };
        let state = AppState::in_memory(config).await.unwrap();
        let output: MetaResolveOutput = parse_output(&resolve_impl(&state, params("example.com/")).await.unwrap());
        assert!(output.debug.unwrap().contains("Cache Key: meta:example.com:/:noq"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_bad_input() {
        let state = AppState::in_memory(AppConfig::default()).await.unwrap();
        assert!(resolve_impl(&state, params("ftp://example.com")).await.is_err());

        let mut p = params("https://example.com/");
        p.overrides.insert("og:title".into(), "x".into());
        assert!(resolve_impl(&state, p).await.is_err());

        let mut p = params("https://example.com/");
        p.add_jsonld.push(serde_json::json!([1, 2]));
        let err = resolve_impl(&state, p).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
