//! Persistent page and alias records.
//!
//! Pages are keyed by the `(domain, path, query_hash)` identity triple and only
//! `active` pages take part in resolution. The resolution engine reads through
//! the narrow [`MetadataStore`] trait; write operations live on
//! [`MetaDb`](crate::MetaDb) and report the identities they touched so callers
//! can invalidate the matching cache keys.

pub mod aliases;
pub mod pages;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::Error;
pub use aliases::AliasRecord;
pub use pages::{PageChange, PageDraft};

/// Publication state of a page record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Draft,
    #[default]
    Active,
}

impl PageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PageStatus::Draft => "draft",
            PageStatus::Active => "active",
        }
    }
}

impl FromStr for PageStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PageStatus::Draft),
            "active" => Ok(PageStatus::Active),
            other => Err(Error::InvalidInput(format!("unknown page status: {other}"))),
        }
    }
}

/// The identity triple a page record is stored and cached under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PageIdentity {
    pub domain: String,
    pub path: String,
    pub query_hash: Option<String>,
}

impl PageIdentity {
    pub fn new(domain: impl Into<String>, path: impl Into<String>, query_hash: Option<String>) -> Self {
        Self { domain: domain.into(), path: path.into(), query_hash }
    }
}

impl fmt::Display for PageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.domain, self.path)?;
        if let Some(hash) = &self.query_hash {
            write!(f, " [{hash}]")?;
        }
        Ok(())
    }
}

/// Authored SEO content of a page.
///
/// Every field is optional; empty values are treated as absent by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PageContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub robots: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub og_title: Option<String>,
    #[serde(default)]
    pub og_description: Option<String>,
    #[serde(default)]
    pub og_image: Option<String>,
    #[serde(default)]
    pub og_site_name: Option<String>,
    #[serde(default)]
    pub twitter_card: Option<String>,
    #[serde(default)]
    pub twitter_title: Option<String>,
    #[serde(default)]
    pub twitter_description: Option<String>,
    #[serde(default)]
    pub twitter_image: Option<String>,
    #[serde(default)]
    pub twitter_site: Option<String>,
    #[serde(default)]
    pub twitter_creator: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub theme_color: Option<String>,

    /// Structured data: a list of objects, or a single object in older records.
    #[serde(default)]
    pub jsonld: Option<serde_json::Value>,

    /// Legacy breadcrumb object kept alongside `jsonld`.
    #[serde(default)]
    pub breadcrumb_jsonld: Option<serde_json::Value>,
}

/// A stored page record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PageRecord {
    pub id: i64,
    pub domain: String,
    pub path: String,
    pub query_hash: Option<String>,
    #[serde(flatten)]
    pub content: PageContent,
    pub status: PageStatus,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl PageRecord {
    pub fn identity(&self) -> PageIdentity {
        PageIdentity::new(self.domain.clone(), self.path.clone(), self.query_hash.clone())
    }
}

/// Read access the resolution engine needs from the record store.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Find the active record for an identity.
    async fn find_active(&self, domain: &str, path: &str, query_hash: Option<&str>)
    -> Result<Option<PageRecord>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_str() {
        assert_eq!("draft".parse::<PageStatus>().unwrap(), PageStatus::Draft);
        assert_eq!(PageStatus::Active.as_str(), "active");
        assert!("archived".parse::<PageStatus>().is_err());
    }

    #[test]
    fn test_identity_display() {
        let bare = PageIdentity::new("example.com", "/", None);
        assert_eq!(bare.to_string(), "example.com/");

        let hashed = PageIdentity::new("example.com", "/search", Some("abc".into()));
        assert_eq!(hashed.to_string(), "example.com/search [abc]");
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = PageRecord {
            id: 1,
            domain: "example.com".into(),
            path: "/".into(),
            query_hash: None,
            content: PageContent { title: Some("Home".into()), ..Default::default() },
            status: PageStatus::Active,
            created_by: None,
            updated_by: None,
            created_at: "2025-01-01T00:00:00Z".into(),
            updated_at: "2025-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["title"], "Home");
        assert_eq!(json["status"], "active");
    }
}
