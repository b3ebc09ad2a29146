//! Path alias records: `(domain, old_path) -> new_path`.
//!
//! Records only. The redirect handler that looks these up lives outside
//! this workspace, so nothing in the MCP server calls into this module.

use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use crate::Error;
use crate::db::MetaDb;

/// A stored path alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AliasRecord {
    pub id: i64,
    pub domain: String,
    pub old_path: String,
    pub new_path: String,
    pub created_at: String,
    pub updated_at: String,
}

fn alias_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AliasRecord> {
    Ok(AliasRecord {
        id: row.get(0)?,
        domain: row.get(1)?,
        old_path: row.get(2)?,
        new_path: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl MetaDb {
    /// Insert or retarget an alias.
    ///
    /// Uses UPSERT semantics on `(domain, old_path)`.
    pub async fn upsert_alias(&self, domain: &str, old_path: &str, new_path: &str) -> Result<AliasRecord, Error> {
        if domain.trim().is_empty() {
            return Err(Error::InvalidInput("domain cannot be empty".into()));
        }
        if !old_path.starts_with('/') || !new_path.starts_with('/') {
            return Err(Error::InvalidInput("alias paths must start with '/'".into()));
        }
        if old_path == new_path {
            return Err(Error::InvalidInput(format!("alias {old_path} points to itself")));
        }

        let domain = domain.to_string();
        let old_path = old_path.to_string();
        let new_path = new_path.to_string();
        let timestamp = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<AliasRecord, Error> {
                conn.execute(
                    "INSERT INTO aliases (domain, old_path, new_path, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?4)
                    ON CONFLICT(domain, old_path) DO UPDATE SET
                        new_path = excluded.new_path,
                        updated_at = excluded.updated_at",
                    params![domain, old_path, new_path, timestamp],
                )?;

                let record = conn.query_row(
                    "SELECT id, domain, old_path, new_path, created_at, updated_at
                    FROM aliases WHERE domain = ?1 AND old_path = ?2",
                    params![domain, old_path],
                    alias_from_row,
                )?;
                Ok(record)
            })
            .await
            .map_err(Error::from)
    }

    /// Find the alias for a path on a domain.
    pub async fn find_alias(&self, domain: &str, old_path: &str) -> Result<Option<AliasRecord>, Error> {
        let domain = domain.to_string();
        let old_path = old_path.to_string();
        self.conn
            .call(move |conn| -> Result<Option<AliasRecord>, Error> {
                let result = conn.query_row(
                    "SELECT id, domain, old_path, new_path, created_at, updated_at
                    FROM aliases WHERE domain = ?1 AND old_path = ?2",
                    params![domain, old_path],
                    alias_from_row,
                );
                match result {
                    Ok(alias) => Ok(Some(alias)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete an alias by id.
    ///
    /// Returns whether an alias was removed.
    pub async fn delete_alias(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM aliases WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
