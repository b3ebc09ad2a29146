//! SQLite database shared by the record store and the cache store.
//!
//! - WAL mode for concurrent readers
//! - Versioned schema migrations

pub mod connection;
pub mod migrations;

pub use connection::MetaDb;
