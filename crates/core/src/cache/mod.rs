//! Key/value cache store used cache-aside by the resolution engine.
//!
//! The engine only sees the [`CacheStore`] trait. [`MetaDb`](crate::MetaDb)
//! implements it over the `cache_entries` table; entries past their expiry
//! read as misses and are removed by [`MetaDb::purge_expired_entries`](crate::MetaDb::purge_expired_entries).

pub mod entries;

use std::time::Duration;

use async_trait::async_trait;

pub use crate::Error;

/// Key/value store with per-entry TTL.
///
/// Implementations may fail; callers in the resolution path treat every
/// failure as a miss (reads) or a skipped write.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Store or replace an entry that expires after `ttl`.
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), Error>;

    /// Remove an entry. Removing a missing key is not an error.
    async fn forget(&self, key: &str) -> Result<(), Error>;
}
