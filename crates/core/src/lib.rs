//! Core types and shared functionality for pagemeta.
//!
//! This crate provides:
//! - SQLite database with page, alias and cache tables
//! - The `MetadataStore` and `CacheStore` seams used by the engine
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod store;

pub use cache::CacheStore;
pub use config::AppConfig;
pub use db::MetaDb;
pub use error::Error;
pub use store::{MetadataStore, PageContent, PageIdentity, PageRecord, PageStatus};
