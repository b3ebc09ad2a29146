//! Resolved metadata documents and the per-request override stack.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use pagemeta_core::{Error, PageContent};
use serde::{Deserialize, Serialize};

use crate::jsonld::JsonLdItem;

/// Merged metadata for one request. Built per resolution and never persisted
/// except as a cache entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ResolvedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub robots: Option<String>,
    pub language: Option<String>,
    pub canonical_url: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub og_type: Option<String>,
    pub og_site_name: Option<String>,
    pub twitter_card: Option<String>,
    pub twitter_title: Option<String>,
    pub twitter_description: Option<String>,
    pub twitter_image: Option<String>,
    pub twitter_site: Option<String>,
    pub twitter_creator: Option<String>,
    pub author: Option<String>,
    pub theme_color: Option<String>,

    /// Always a list of objects.
    #[serde(default)]
    pub jsonld: Vec<JsonLdItem>,

    /// Echo of the record's `updated_at`; None for fallback documents.
    pub updated_at: Option<String>,
}

impl ResolvedMetadata {
    /// Copy authored content, treating empty strings as absent.
    pub fn from_content(content: &PageContent) -> Self {
        Self {
            title: non_empty(&content.title),
            description: non_empty(&content.description),
            keywords: non_empty(&content.keywords),
            robots: non_empty(&content.robots),
            language: non_empty(&content.language),
            canonical_url: non_empty(&content.canonical_url),
            og_title: non_empty(&content.og_title),
            og_description: non_empty(&content.og_description),
            og_image: non_empty(&content.og_image),
            og_type: None,
            og_site_name: non_empty(&content.og_site_name),
            twitter_card: non_empty(&content.twitter_card),
            twitter_title: non_empty(&content.twitter_title),
            twitter_description: non_empty(&content.twitter_description),
            twitter_image: non_empty(&content.twitter_image),
            twitter_site: non_empty(&content.twitter_site),
            twitter_creator: non_empty(&content.twitter_creator),
            author: non_empty(&content.author),
            theme_color: non_empty(&content.theme_color),
            jsonld: Vec::new(),
            updated_at: None,
        }
    }

    pub fn get(&self, field: MetaField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    fn slot(&self, field: MetaField) -> &Option<String> {
        match field {
            MetaField::Title => &self.title,
            MetaField::Description => &self.description,
            MetaField::Keywords => &self.keywords,
            MetaField::Robots => &self.robots,
            MetaField::Language => &self.language,
            MetaField::CanonicalUrl => &self.canonical_url,
            MetaField::OgTitle => &self.og_title,
            MetaField::OgDescription => &self.og_description,
            MetaField::OgImage => &self.og_image,
            MetaField::OgType => &self.og_type,
            MetaField::OgSiteName => &self.og_site_name,
            MetaField::TwitterCard => &self.twitter_card,
            MetaField::TwitterTitle => &self.twitter_title,
            MetaField::TwitterDescription => &self.twitter_description,
            MetaField::TwitterImage => &self.twitter_image,
            MetaField::TwitterSite => &self.twitter_site,
            MetaField::TwitterCreator => &self.twitter_creator,
            MetaField::Author => &self.author,
            MetaField::ThemeColor => &self.theme_color,
        }
    }

    pub fn field_mut(&mut self, field: MetaField) -> &mut Option<String> {
        match field {
            MetaField::Title => &mut self.title,
            MetaField::Description => &mut self.description,
            MetaField::Keywords => &mut self.keywords,
            MetaField::Robots => &mut self.robots,
            MetaField::Language => &mut self.language,
            MetaField::CanonicalUrl => &mut self.canonical_url,
            MetaField::OgTitle => &mut self.og_title,
            MetaField::OgDescription => &mut self.og_description,
            MetaField::OgImage => &mut self.og_image,
            MetaField::OgType => &mut self.og_type,
            MetaField::OgSiteName => &mut self.og_site_name,
            MetaField::TwitterCard => &mut self.twitter_card,
            MetaField::TwitterTitle => &mut self.twitter_title,
            MetaField::TwitterDescription => &mut self.twitter_description,
            MetaField::TwitterImage => &mut self.twitter_image,
            MetaField::TwitterSite => &mut self.twitter_site,
            MetaField::TwitterCreator => &mut self.twitter_creator,
            MetaField::Author => &mut self.author,
            MetaField::ThemeColor => &mut self.theme_color,
        }
    }

    /// Fill `field` only when it has no value yet.
    pub(crate) fn fill(&mut self, field: MetaField, value: impl Into<String>) {
        let slot = self.field_mut(field);
        if slot.is_none() {
            *slot = Some(value.into());
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// String-valued fields of [`ResolvedMetadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetaField {
    Title,
    Description,
    Keywords,
    Robots,
    Language,
    CanonicalUrl,
    OgTitle,
    OgDescription,
    OgImage,
    OgType,
    OgSiteName,
    TwitterCard,
    TwitterTitle,
    TwitterDescription,
    TwitterImage,
    TwitterSite,
    TwitterCreator,
    Author,
    ThemeColor,
}

impl MetaField {
    pub const ALL: [MetaField; 19] = [
        MetaField::Title,
        MetaField::Description,
        MetaField::Keywords,
        MetaField::Robots,
        MetaField::Language,
        MetaField::CanonicalUrl,
        MetaField::OgTitle,
        MetaField::OgDescription,
        MetaField::OgImage,
        MetaField::OgType,
        MetaField::OgSiteName,
        MetaField::TwitterCard,
        MetaField::TwitterTitle,
        MetaField::TwitterDescription,
        MetaField::TwitterImage,
        MetaField::TwitterSite,
        MetaField::TwitterCreator,
        MetaField::Author,
        MetaField::ThemeColor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetaField::Title => "title",
            MetaField::Description => "description",
            MetaField::Keywords => "keywords",
            MetaField::Robots => "robots",
            MetaField::Language => "language",
            MetaField::CanonicalUrl => "canonical_url",
            MetaField::OgTitle => "og_title",
            MetaField::OgDescription => "og_description",
            MetaField::OgImage => "og_image",
            MetaField::OgType => "og_type",
            MetaField::OgSiteName => "og_site_name",
            MetaField::TwitterCard => "twitter_card",
            MetaField::TwitterTitle => "twitter_title",
            MetaField::TwitterDescription => "twitter_description",
            MetaField::TwitterImage => "twitter_image",
            MetaField::TwitterSite => "twitter_site",
            MetaField::TwitterCreator => "twitter_creator",
            MetaField::Author => "author",
            MetaField::ThemeColor => "theme_color",
        }
    }
}

impl fmt::Display for MetaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetaField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "canonical" {
            return Ok(MetaField::CanonicalUrl);
        }
        MetaField::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown metadata field: {s}")))
    }
}

/// Request-scoped values merged over a resolved document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaOverrides {
    fields: BTreeMap<MetaField, String>,
    jsonld: Option<Vec<JsonLdItem>>,
    appended: Vec<JsonLdItem>,
}

impl MetaOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.jsonld.is_none() && self.appended.is_empty()
    }

    pub fn set(&mut self, field: MetaField, value: impl Into<String>) -> &mut Self {
        self.fields.insert(field, value.into());
        self
    }

    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.set(MetaField::Title, title)
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.set(MetaField::Description, description)
    }

    pub fn canonical(&mut self, url: impl Into<String>) -> &mut Self {
        self.set(MetaField::CanonicalUrl, url)
    }

    pub fn robots(&mut self, robots: impl Into<String>) -> &mut Self {
        self.set(MetaField::Robots, robots)
    }

    pub fn og_image(&mut self, url: impl Into<String>) -> &mut Self {
        self.set(MetaField::OgImage, url)
    }

    /// Replace the resolved JSON-LD list; earlier appends are discarded.
    pub fn replace_json_ld(&mut self, items: Vec<JsonLdItem>) -> &mut Self {
        self.jsonld = Some(items);
        self.appended.clear();
        self
    }

    /// Append one item after the resolved JSON-LD.
    pub fn add_json_ld(&mut self, item: JsonLdItem) -> &mut Self {
        self.appended.push(item);
        self
    }

    /// Shallow merge over `meta`: overridden fields replace, JSON-LD appends.
    pub fn apply(&self, meta: &mut ResolvedMetadata) {
        for (field, value) in &self.fields {
            *meta.field_mut(*field) = Some(value.clone());
        }
        if let Some(items) = &self.jsonld {
            meta.jsonld = items.clone();
        }
        meta.jsonld.extend(self.appended.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(kind: &str) -> JsonLdItem {
        match json!({ "@type": kind }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_from_content_drops_blank_values() {
        let content = PageContent {
            title: Some("Rooms".into()),
            description: Some("   ".into()),
            robots: Some(String::new()),
            ..Default::default()
        };
        let meta = ResolvedMetadata::from_content(&content);
        assert_eq!(meta.title.as_deref(), Some("Rooms"));
        assert_eq!(meta.description, None);
        assert_eq!(meta.robots, None);
    }

    #[test]
    fn test_fill_keeps_existing() {
        let mut meta = ResolvedMetadata { robots: Some("noarchive".into()), ..Default::default() };
        meta.fill(MetaField::Robots, "index, follow");
        meta.fill(MetaField::CanonicalUrl, "https://example.com/");
        assert_eq!(meta.robots.as_deref(), Some("noarchive"));
        assert_eq!(meta.canonical_url.as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in MetaField::ALL {
            assert_eq!(field.name().parse::<MetaField>().unwrap(), field);
        }
        assert_eq!("canonical".parse::<MetaField>().unwrap(), MetaField::CanonicalUrl);
        assert!("og:title".parse::<MetaField>().is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let mut meta = ResolvedMetadata {
            title: Some("Stored".into()),
            description: Some("Kept".into()),
            jsonld: vec![item("WebSite")],
            ..Default::default()
        };
        let mut overrides = MetaOverrides::new();
        overrides.title("Override").og_image("/x.png").add_json_ld(item("Product"));
        overrides.apply(&mut meta);

        assert_eq!(meta.title.as_deref(), Some("Override"));
        assert_eq!(meta.description.as_deref(), Some("Kept"));
        assert_eq!(meta.og_image.as_deref(), Some("/x.png"));
        let types: Vec<_> = meta.jsonld.iter().map(|i| i["@type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["WebSite", "Product"]);
    }

    #[test]
    fn test_replace_json_ld() {
        let mut meta = ResolvedMetadata { jsonld: vec![item("WebSite")], ..Default::default() };
        let mut overrides = MetaOverrides::new();
        overrides.add_json_ld(item("Dropped")).replace_json_ld(vec![item("Event")]).add_json_ld(item("Offer"));
        overrides.apply(&mut meta);

        let types: Vec<_> = meta.jsonld.iter().map(|i| i["@type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["Event", "Offer"]);
    }

    #[test]
    fn test_is_empty() {
        let mut overrides = MetaOverrides::new();
        assert!(overrides.is_empty());
        overrides.robots("noindex");
        assert!(!overrides.is_empty());
    }
}
