//! Page record CRUD operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use super::{MetadataStore, PageContent, PageIdentity, PageRecord, PageStatus};
use crate::Error;
use crate::db::MetaDb;

const PAGE_COLUMNS: &str = "id, domain, path, query_hash,
    title, description, keywords, robots, language, canonical_url,
    og_title, og_description, og_image, og_site_name,
    twitter_card, twitter_title, twitter_description, twitter_image, twitter_site, twitter_creator,
    author, theme_color, jsonld, breadcrumb_jsonld,
    status, created_by, updated_by, created_at, updated_at";

/// Input for creating or replacing a page record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PageDraft {
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub query_hash: Option<String>,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(flatten)]
    pub content: PageContent,
}

impl PageDraft {
    pub fn identity(&self) -> PageIdentity {
        PageIdentity::new(self.domain.clone(), self.path.clone(), self.query_hash.clone())
    }

    fn validate(&self) -> Result<(), Error> {
        if self.domain.trim().is_empty() {
            return Err(Error::InvalidInput("domain cannot be empty".into()));
        }
        if !self.path.starts_with('/') {
            return Err(Error::InvalidInput(format!("path must start with '/': {}", self.path)));
        }
        if self.query_hash.as_deref().is_some_and(str::is_empty) {
            return Err(Error::InvalidInput("query_hash must be null or non-empty".into()));
        }
        Ok(())
    }
}

/// Result of an update: the identity before the write and the stored record after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageChange {
    pub before: PageIdentity,
    pub record: PageRecord,
}

impl PageChange {
    pub fn identity_changed(&self) -> bool {
        self.before != self.record.identity()
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn encode_json(value: &Option<serde_json::Value>) -> Result<Option<String>, Error> {
    value.as_ref().map(serde_json::to_string).transpose().map_err(Error::from)
}

/// Decode a JSON column, dropping (and logging) content that is not valid JSON.
fn decode_json(raw: Option<String>, column: &str, id: i64) -> Option<serde_json::Value> {
    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(page_id = id, column, error = %e, "dropping invalid stored JSON-LD");
            None
        }
    }
}

fn page_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PageRecord> {
    let id: i64 = row.get(0)?;
    let status: String = row.get(24)?;
    let status = status.parse::<PageStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(24, rusqlite::types::Type::Text, e.to_string().into())
    })?;

    Ok(PageRecord {
        id,
        domain: row.get(1)?,
        path: row.get(2)?,
        query_hash: row.get(3)?,
        content: PageContent {
            title: row.get(4)?,
            description: row.get(5)?,
            keywords: row.get(6)?,
            robots: row.get(7)?,
            language: row.get(8)?,
            canonical_url: row.get(9)?,
            og_title: row.get(10)?,
            og_description: row.get(11)?,
            og_image: row.get(12)?,
            og_site_name: row.get(13)?,
            twitter_card: row.get(14)?,
            twitter_title: row.get(15)?,
            twitter_description: row.get(16)?,
            twitter_image: row.get(17)?,
            twitter_site: row.get(18)?,
            twitter_creator: row.get(19)?,
            author: row.get(20)?,
            theme_color: row.get(21)?,
            jsonld: decode_json(row.get(22)?, "jsonld", id),
            breadcrumb_jsonld: decode_json(row.get(23)?, "breadcrumb_jsonld", id),
        },
        status,
        created_by: row.get(25)?,
        updated_by: row.get(26)?,
        created_at: row.get(27)?,
        updated_at: row.get(28)?,
    })
}

fn select_page(conn: &rusqlite::Connection, id: i64) -> Result<Option<PageRecord>, Error> {
    let mut stmt = conn.prepare(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = ?1"))?;
    match stmt.query_row(params![id], page_from_row) {
        Ok(page) => Ok(Some(page)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn select_identity(conn: &rusqlite::Connection, id: i64) -> Result<Option<PageIdentity>, Error> {
    let result = conn.query_row("SELECT domain, path, query_hash FROM pages WHERE id = ?1", params![id], |row| {
        Ok(PageIdentity { domain: row.get(0)?, path: row.get(1)?, query_hash: row.get(2)? })
    });
    match result {
        Ok(identity) => Ok(Some(identity)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_error(err: rusqlite::Error, identity: &PageIdentity) -> Error {
    let err = Error::from(err);
    if err.is_constraint_violation() { Error::DuplicateIdentity(identity.to_string()) } else { err }
}

impl MetaDb {
    /// Insert a new page record.
    ///
    /// Fails with `DuplicateIdentity` if another record owns the same triple.
    pub async fn insert_page(&self, draft: &PageDraft, actor: Option<i64>) -> Result<PageRecord, Error> {
        draft.validate()?;
        let draft = draft.clone();
        let jsonld = encode_json(&draft.content.jsonld)?;
        let breadcrumb = encode_json(&draft.content.breadcrumb_jsonld)?;
        let timestamp = now();

        self.conn
            .call(move |conn| -> Result<PageRecord, Error> {
                let c = &draft.content;
                conn.execute(
                    "INSERT INTO pages (
                    domain, path, query_hash,
                    title, description, keywords, robots, language, canonical_url,
                    og_title, og_description, og_image, og_site_name,
                    twitter_card, twitter_title, twitter_description, twitter_image, twitter_site, twitter_creator,
                    author, theme_color, jsonld, breadcrumb_jsonld,
                    status, created_by, updated_by, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                          ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                          ?21, ?22, ?23, ?24, ?25, ?25, ?26, ?26)",
                    params![
                        &draft.domain,
                        &draft.path,
                        &draft.query_hash,
                        &c.title,
                        &c.description,
                        &c.keywords,
                        &c.robots,
                        &c.language,
                        &c.canonical_url,
                        &c.og_title,
                        &c.og_description,
                        &c.og_image,
                        &c.og_site_name,
                        &c.twitter_card,
                        &c.twitter_title,
                        &c.twitter_description,
                        &c.twitter_image,
                        &c.twitter_site,
                        &c.twitter_creator,
                        &c.author,
                        &c.theme_color,
                        &jsonld,
                        &breadcrumb,
                        draft.status.as_str(),
                        &actor,
                        &timestamp,
                    ],
                )
                .map_err(|e| write_error(e, &draft.identity()))?;

                let id = conn.last_insert_rowid();
                select_page(conn, id)?.ok_or_else(|| Error::NotFound(format!("page {id}")))
            })
            .await
            .map_err(Error::from)
    }

    /// Get a page record by id, regardless of status.
    pub async fn get_page(&self, id: i64) -> Result<Option<PageRecord>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<PageRecord>, Error> { select_page(conn, id) })
            .await
            .map_err(Error::from)
    }

    /// Replace every field of an existing page record.
    ///
    /// Returns the identity the record had before the write together with the
    /// updated record, so both cache keys can be purged.
    pub async fn update_page(&self, id: i64, draft: &PageDraft, actor: Option<i64>) -> Result<PageChange, Error> {
        draft.validate()?;
        let draft = draft.clone();
        let jsonld = encode_json(&draft.content.jsonld)?;
        let breadcrumb = encode_json(&draft.content.breadcrumb_jsonld)?;
        let timestamp = now();

        self.conn
            .call(move |conn| -> Result<PageChange, Error> {
                let tx = conn.transaction()?;
                let before = select_identity(&tx, id)?.ok_or_else(|| Error::NotFound(format!("page {id}")))?;

                let c = &draft.content;
                tx.execute(
                    "UPDATE pages SET
                    domain = ?2, path = ?3, query_hash = ?4,
                    title = ?5, description = ?6, keywords = ?7, robots = ?8, language = ?9, canonical_url = ?10,
                    og_title = ?11, og_description = ?12, og_image = ?13, og_site_name = ?14,
                    twitter_card = ?15, twitter_title = ?16, twitter_description = ?17, twitter_image = ?18,
                    twitter_site = ?19, twitter_creator = ?20,
                    author = ?21, theme_color = ?22, jsonld = ?23, breadcrumb_jsonld = ?24,
                    status = ?25, updated_by = COALESCE(?26, updated_by), updated_at = ?27
                WHERE id = ?1",
                    params![
                        id,
                        &draft.domain,
                        &draft.path,
                        &draft.query_hash,
                        &c.title,
                        &c.description,
                        &c.keywords,
                        &c.robots,
                        &c.language,
                        &c.canonical_url,
                        &c.og_title,
                        &c.og_description,
                        &c.og_image,
                        &c.og_site_name,
                        &c.twitter_card,
                        &c.twitter_title,
                        &c.twitter_description,
                        &c.twitter_image,
                        &c.twitter_site,
                        &c.twitter_creator,
                        &c.author,
                        &c.theme_color,
                        &jsonld,
                        &breadcrumb,
                        draft.status.as_str(),
                        &actor,
                        &timestamp,
                    ],
                )
                .map_err(|e| write_error(e, &draft.identity()))?;

                let record = select_page(&tx, id)?.ok_or_else(|| Error::NotFound(format!("page {id}")))?;
                tx.commit()?;
                Ok(PageChange { before, record })
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a page record.
    ///
    /// Returns the identity of the deleted record, or None if it did not exist.
    pub async fn delete_page(&self, id: i64) -> Result<Option<PageIdentity>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<PageIdentity>, Error> {
                let tx = conn.transaction()?;
                let identity = select_identity(&tx, id)?;
                if identity.is_some() {
                    tx.execute("DELETE FROM pages WHERE id = ?1", params![id])?;
                }
                tx.commit()?;
                Ok(identity)
            })
            .await
            .map_err(Error::from)
    }

    /// Find a record by identity, regardless of status.
    pub async fn find_page(
        &self, domain: &str, path: &str, query_hash: Option<&str>,
    ) -> Result<Option<PageRecord>, Error> {
        self.find_by_identity(domain, path, query_hash, false).await
    }

    /// Find the active record for an identity.
    pub async fn find_active_page(
        &self, domain: &str, path: &str, query_hash: Option<&str>,
    ) -> Result<Option<PageRecord>, Error> {
        self.find_by_identity(domain, path, query_hash, true).await
    }

    async fn find_by_identity(
        &self, domain: &str, path: &str, query_hash: Option<&str>, active_only: bool,
    ) -> Result<Option<PageRecord>, Error> {
        let domain = domain.to_string();
        let path = path.to_string();
        let query_hash = query_hash.map(str::to_string);
        self.conn
            .call(move |conn| -> Result<Option<PageRecord>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {PAGE_COLUMNS} FROM pages
                    WHERE domain = ?1 AND path = ?2 AND query_hash IS ?3
                    AND (?4 = 0 OR status = 'active')
                    LIMIT 1"
                ))?;

                match stmt.query_row(params![domain, path, query_hash, active_only], page_from_row) {
                    Ok(page) => Ok(Some(page)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl MetadataStore for MetaDb {
    async fn find_active(
        &self, domain: &str, path: &str, query_hash: Option<&str>,
    ) -> Result<Option<PageRecord>, Error> {
        self.find_active_page(domain, path, query_hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(domain: &str, path: &str, query_hash: Option<&str>) -> PageDraft {
        PageDraft {
            domain: domain.to_string(),
            path: path.to_string(),
            query_hash: query_hash.map(str::to_string),
            status: PageStatus::Active,
            content: PageContent {
                title: Some("Student Housing".into()),
                description: Some("Rooms near campus".into()),
                jsonld: Some(json!([{"@type": "WebPage"}])),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = MetaDb::open_in_memory().await.unwrap();
        let record = db.insert_page(&draft("example.com", "/rooms", None), Some(7)).await.unwrap();

        assert_eq!(record.domain, "example.com");
        assert_eq!(record.content.title.as_deref(), Some("Student Housing"));
        assert_eq!(record.content.jsonld, Some(json!([{"@type": "WebPage"}])));
        assert_eq!(record.created_by, Some(7));
        assert_eq!(record.updated_by, Some(7));

        let fetched = db.get_page(record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn test_duplicate_identity_rejected() {
        let db = MetaDb::open_in_memory().await.unwrap();
        db.insert_page(&draft("example.com", "/rooms", None), None).await.unwrap();

        let err = db.insert_page(&draft("example.com", "/rooms", None), None).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity(_)));

        let hashed = db.insert_page(&draft("example.com", "/rooms", Some("abc")), None).await;
        assert!(hashed.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_draft_rejected() {
        let db = MetaDb::open_in_memory().await.unwrap();
        let err = db.insert_page(&draft("", "/", None), None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = db.insert_page(&draft("example.com", "rooms", None), None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_find_active_excludes_drafts() {
        let db = MetaDb::open_in_memory().await.unwrap();
        let mut d = draft("example.com", "/draft", None);
        d.status = PageStatus::Draft;
        db.insert_page(&d, None).await.unwrap();

        assert!(db.find_active_page("example.com", "/draft", None).await.unwrap().is_none());
        assert!(db.find_page("example.com", "/draft", None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_active_matches_query_hash_exactly() {
        let db = MetaDb::open_in_memory().await.unwrap();
        db.insert_page(&draft("example.com", "/search", Some("h1")), None).await.unwrap();

        assert!(db.find_active_page("example.com", "/search", Some("h1")).await.unwrap().is_some());
        assert!(db.find_active_page("example.com", "/search", None).await.unwrap().is_none());
        assert!(db.find_active_page("example.com", "/search", Some("h2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_reports_previous_identity() {
        let db = MetaDb::open_in_memory().await.unwrap();
        let record = db.insert_page(&draft("example.com", "/old", None), Some(1)).await.unwrap();

        let mut moved = draft("example.com", "/new", None);
        moved.content.title = Some("Moved".into());
        let change = db.update_page(record.id, &moved, Some(2)).await.unwrap();

        assert_eq!(change.before, PageIdentity::new("example.com", "/old", None));
        assert_eq!(change.record.path, "/new");
        assert_eq!(change.record.content.title.as_deref(), Some("Moved"));
        assert_eq!(change.record.created_by, Some(1));
        assert_eq!(change.record.updated_by, Some(2));
        assert!(change.identity_changed());
    }

    #[tokio::test]
    async fn test_update_missing_page() {
        let db = MetaDb::open_in_memory().await.unwrap();
        let err = db.update_page(99, &draft("example.com", "/", None), None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_into_taken_identity() {
        let db = MetaDb::open_in_memory().await.unwrap();
        db.insert_page(&draft("example.com", "/a", None), None).await.unwrap();
        let b = db.insert_page(&draft("example.com", "/b", None), None).await.unwrap();

        let err = db.update_page(b.id, &draft("example.com", "/a", None), None).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity(_)));
    }

    #[tokio::test]
    async fn test_delete_page() {
        let db = MetaDb::open_in_memory().await.unwrap();
        let record = db.insert_page(&draft("example.com", "/gone", Some("h")), None).await.unwrap();

        let deleted = db.delete_page(record.id).await.unwrap();
        assert_eq!(deleted, Some(PageIdentity::new("example.com", "/gone", Some("h".into()))));
        assert!(db.get_page(record.id).await.unwrap().is_none());
        assert!(db.delete_page(record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_stored_jsonld_is_dropped() {
        let db = MetaDb::open_in_memory().await.unwrap();
        let record = db.insert_page(&draft("example.com", "/broken", None), None).await.unwrap();
        let id = record.id;

        db.conn
            .call(move |conn| conn.execute("UPDATE pages SET jsonld = '{not json' WHERE id = ?1", params![id]))
            .await
            .unwrap();

        let fetched = db.get_page(id).await.unwrap().unwrap();
        assert!(fetched.content.jsonld.is_none());
        assert_eq!(fetched.content.title.as_deref(), Some("Student Housing"));
    }
}
