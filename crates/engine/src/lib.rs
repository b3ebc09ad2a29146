//! Metadata resolution for pagemeta.
//!
//! This crate provides:
//! - Request-to-identity resolution with a query whitelist (`key`)
//! - Indexability decisions over normalized queries (`policy`)
//! - Cache-aside resolution with a per-request override stack (`resolve`)
//! - Head and JSON-LD rendering (`render`)
//! - Duplicate tag removal for finished responses (`guard`)

pub mod guard;
pub mod jsonld;
pub mod key;
pub mod metadata;
pub mod policy;
pub mod render;
pub mod resolve;

pub use guard::{Conflict, ConflictGuard, GuardOutcome, SkipReason, TagFamily};
pub use jsonld::JsonLdItem;
pub use key::{KeyResolver, NormalizedQuery, PageRequest, QueryIdentity, RequestError, generate_cache_key};
pub use metadata::{MetaField, MetaOverrides, ResolvedMetadata};
pub use policy::{IndexDecision, IndexReason, IndexingPolicy};
pub use resolve::{MetaContext, Resolution, ResolutionEngine, ResolutionSource};
