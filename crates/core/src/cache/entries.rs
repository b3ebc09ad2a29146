//! Cache entry operations on the `cache_entries` table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::params;

use super::CacheStore;
use crate::Error;
use crate::db::MetaDb;

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl MetaDb {
    /// Get a live cache entry by key.
    ///
    /// Returns None if the key doesn't exist or has expired.
    pub async fn get_entry(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let key = key.to_string();
        let now = now_millis();
        self.conn
            .call(move |conn| -> Result<Option<Vec<u8>>, Error> {
                let mut stmt =
                    conn.prepare("SELECT value FROM cache_entries WHERE cache_key = ?1 AND expires_at > ?2")?;

                let result = stmt.query_row(params![key, now], |row| row.get(0));

                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(tokio_rusqlite::rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace a cache entry.
    ///
    /// Uses UPSERT semantics so concurrent writers of the same key simply
    /// leave the last value in place.
    pub async fn put_entry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_vec();
        let stored_at = now_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = stored_at.saturating_add(ttl_ms);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (cache_key, value, stored_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(cache_key) DO UPDATE SET
                        value = excluded.value,
                        stored_at = excluded.stored_at,
                        expires_at = excluded.expires_at",
                    params![key, value, stored_at, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a cache entry.
    ///
    /// Returns whether an entry was removed.
    pub async fn delete_entry(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE cache_key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired cache entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_entries(&self) -> Result<u64, Error> {
        let now = now_millis();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStore for MetaDb {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        self.get_entry(key)
            .await
            .map_err(|e| Error::CacheUnavailable(e.to_string()))
    }

    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), Error> {
        self.put_entry(key, value, ttl)
            .await
            .map_err(|e| Error::CacheUnavailable(e.to_string()))
    }

    async fn forget(&self, key: &str) -> Result<(), Error> {
        self.delete_entry(key)
            .await
            .map(|_| ())
            .map_err(|e| Error::CacheUnavailable(e.to_string()))
    }
}
