//! pagemeta server entry point.
//!
//! Boots the MCP server on stdio transport. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use pagemeta_core::{AppConfig, MetaDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let db = MetaDb::open(&config.db_path).await?;

    match db.purge_expired_entries().await {
        Ok(0) => {}
        Ok(deleted) => tracing::info!(deleted, "Purged expired cache entries"),
        Err(e) => tracing::warn!(error = %e, "Failed to purge expired cache entries"),
    }

    tracing::info!(db_path = %config.db_path.display(), "Starting pagemeta server on stdio transport");

    let handler = handler::PageMetaServer::new(state::AppState::new(&config, db));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
