//! page_save and page_delete tool implementations.
//!
//! Every successful write purges the cache keys of the identities it
//! touched: the previous identity and the new one when an update moves a
//! record, or the removed identity on delete.

use std::collections::BTreeMap;

use pagemeta_core::store::{PageDraft, PageRecord};
use pagemeta_core::{Error, PageContent, PageIdentity, PageStatus};
use pagemeta_engine::PageRequest;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::AppState;

/// Input parameters for the page_save tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PageSaveParams {
    /// Id of the record to replace. Omit to create a new record.
    #[serde(default)]
    pub id: Option<i64>,

    /// Domain, including a non-standard port (e.g. `localhost:8000`).
    pub domain: String,

    pub path: String,

    /// Query parameters identifying a variant of the page. Only whitelisted,
    /// non-empty parameters contribute to the stored query hash.
    #[serde(default)]
    pub query: BTreeMap<String, String>,

    #[serde(default)]
    pub status: PageStatus,

    /// Id of the user making the change, recorded in the audit fields.
    #[serde(default)]
    pub actor: Option<i64>,

    #[serde(flatten)]
    pub content: PageContent,
}

/// Output structure for the page_save tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageSaveOutput {
    pub record: PageRecord,
    /// Cache keys purged because of this write.
    pub purged_keys: Vec<String>,
}

/// Input parameters for the page_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageDeleteParams {
    pub id: i64,
}

/// Output structure for the page_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageDeleteOutput {
    pub deleted: PageIdentity,
    pub purged_keys: Vec<String>,
}

/// Build the stored identity the same way requests are resolved.
fn draft_from_params(state: &AppState, params: PageSaveParams) -> Result<PageDraft, Error> {
    let keys = state.engine.keys();
    let request = params
        .query
        .into_iter()
        .fold(PageRequest::from_parts(&params.domain, &params.path)?, |req, (k, v)| req.with_query(k, v));

    Ok(PageDraft {
        domain: keys.resolve_domain(&request),
        path: keys.resolve_path(&request),
        query_hash: keys.resolve_query_hash(&request),
        status: params.status,
        content: params.content,
    })
}

/// Implementation of the page_save tool.
pub async fn save_impl(state: &AppState, params: PageSaveParams) -> Result<CallToolResult, McpError> {
    if params.domain.trim().is_empty() {
        return Err(Error::InvalidInput("domain cannot be empty".to_string()).into());
    }

    let id = params.id;
    let actor = params.actor;
    let draft = draft_from_params(state, params)?;

    let (record, touched) = match id {
        Some(id) => {
            let change = state.db.update_page(id, &draft, actor).await?;
            let after = change.record.identity();
            if change.identity_changed() {
                tracing::info!(page_id = id, from = %change.before, to = %after, "Page identity changed");
            }
            (change.record, vec![change.before, after])
        }
        None => {
            let record = state.db.insert_page(&draft, actor).await?;
            let identity = record.identity();
            (record, vec![identity])
        }
    };

    let purged_keys = state.engine.invalidate(&touched).await;
    json_result(&PageSaveOutput { record, purged_keys })
}

/// Implementation of the page_delete tool.
pub async fn delete_impl(state: &AppState, params: PageDeleteParams) -> Result<CallToolResult, McpError> {
    let deleted = state
        .db
        .delete_page(params.id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("page {}", params.id)))?;

    let purged_keys = state.engine.invalidate([&deleted]).await;
    json_result(&PageDeleteOutput { deleted, purged_keys })
}
