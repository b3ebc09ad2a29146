//! Shared server state.

use std::sync::Arc;

use pagemeta_core::{AppConfig, MetaDb};
use pagemeta_engine::{ConflictGuard, ResolutionEngine};

/// Long-lived services shared by every tool call.
///
/// Nothing here holds per-request data; each call builds its own
/// `MetaContext` from the engine.
pub struct AppState {
    pub db: MetaDb,
    pub engine: ResolutionEngine,
    pub guard: ConflictGuard,
}

impl AppState {
    /// Wire the engine and guard to one database acting as record and cache store.
    pub fn new(config: &AppConfig, db: MetaDb) -> Self {
        let engine = ResolutionEngine::new(config, Arc::new(db.clone()), Arc::new(db.clone()));
        let guard = ConflictGuard::from_config(config);
        Self { db, engine, guard }
    }

    #[cfg(test)]
    pub async fn in_memory(config: AppConfig) -> Result<Self, pagemeta_core::Error> {
        Ok(Self::new(&config, MetaDb::open_in_memory().await?))
    }
}
