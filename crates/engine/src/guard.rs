//! Duplicate tag removal for finished HTML responses.
//!
//! Templates, partials and third-party components can all emit their own
//! `<title>` or `og:*` tags. The guard scans the finished body for a fixed
//! vocabulary of tag families, keeps the first occurrence of each and
//! deletes the rest. Scanning is regex based and limited to the document
//! head by default; a body it cannot confidently bound is passed through
//! untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use pagemeta_core::AppConfig;
use pagemeta_core::config::ConflictGuardConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A tag family deduplicated by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum TagFamily {
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "description")]
    Description,
    #[serde(rename = "canonical")]
    Canonical,
    #[serde(rename = "og:title")]
    OgTitle,
    #[serde(rename = "og:description")]
    OgDescription,
    #[serde(rename = "og:image")]
    OgImage,
    #[serde(rename = "og:site_name")]
    OgSiteName,
    #[serde(rename = "twitter:card")]
    TwitterCard,
    #[serde(rename = "twitter:title")]
    TwitterTitle,
    #[serde(rename = "twitter:description")]
    TwitterDescription,
    #[serde(rename = "twitter:image")]
    TwitterImage,
    #[serde(rename = "twitter:site")]
    TwitterSite,
    #[serde(rename = "twitter:creator")]
    TwitterCreator,
    #[serde(rename = "author")]
    Author,
    #[serde(rename = "generator")]
    Generator,
    #[serde(rename = "referrer")]
    Referrer,
    #[serde(rename = "theme-color")]
    ThemeColor,
}

enum Markup {
    Title,
    MetaName,
    MetaProperty,
    CanonicalLink,
}

impl TagFamily {
    pub const ALL: [TagFamily; 17] = [
        TagFamily::Title,
        TagFamily::Description,
        TagFamily::Canonical,
        TagFamily::OgTitle,
        TagFamily::OgDescription,
        TagFamily::OgImage,
        TagFamily::OgSiteName,
        TagFamily::TwitterCard,
        TagFamily::TwitterTitle,
        TagFamily::TwitterDescription,
        TagFamily::TwitterImage,
        TagFamily::TwitterSite,
        TagFamily::TwitterCreator,
        TagFamily::Author,
        TagFamily::Generator,
        TagFamily::Referrer,
        TagFamily::ThemeColor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TagFamily::Title => "title",
            TagFamily::Description => "description",
            TagFamily::Canonical => "canonical",
            TagFamily::OgTitle => "og:title",
            TagFamily::OgDescription => "og:description",
            TagFamily::OgImage => "og:image",
            TagFamily::OgSiteName => "og:site_name",
            TagFamily::TwitterCard => "twitter:card",
            TagFamily::TwitterTitle => "twitter:title",
            TagFamily::TwitterDescription => "twitter:description",
            TagFamily::TwitterImage => "twitter:image",
            TagFamily::TwitterSite => "twitter:site",
            TagFamily::TwitterCreator => "twitter:creator",
            TagFamily::Author => "author",
            TagFamily::Generator => "generator",
            TagFamily::Referrer => "referrer",
            TagFamily::ThemeColor => "theme-color",
        }
    }

    fn markup(self) -> Markup {
        match self {
            TagFamily::Title => Markup::Title,
            TagFamily::Canonical => Markup::CanonicalLink,
            TagFamily::OgTitle | TagFamily::OgDescription | TagFamily::OgImage | TagFamily::OgSiteName => {
                Markup::MetaProperty
            }
            _ => Markup::MetaName,
        }
    }

    /// Message recorded when a duplicate of this family is removed.
    pub fn conflict_message(self) -> String {
        match self {
            TagFamily::Title => "Duplicate <title> tag removed".to_string(),
            TagFamily::Description => "Duplicate meta description tag removed".to_string(),
            TagFamily::Canonical => "Duplicate canonical link removed".to_string(),
            other => format!("Duplicate {} tag removed", other.name()),
        }
    }

    fn pattern(self) -> String {
        let name = regex::escape(self.name());
        match self.markup() {
            Markup::Title => r"(?is)<title\b[^>]*>.*?</title\s*>".to_string(),
            Markup::MetaName => format!(r#"(?i)<meta\b[^>]*?\sname\s*=\s*["']{name}["'][^>]*>"#),
            Markup::MetaProperty => format!(r#"(?i)<meta\b[^>]*?\sproperty\s*=\s*["']{name}["'][^>]*>"#),
            Markup::CanonicalLink => r#"(?i)<link\b[^>]*?\srel\s*=\s*["']canonical["'][^>]*>"#.to_string(),
        }
    }

    fn regex(self) -> &'static Regex {
        &FAMILY_PATTERNS[&self]
    }

    /// Whether `html` already contains a tag of this family.
    pub fn is_present(self, html: &str) -> bool {
        self.regex().is_match(html)
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static FAMILY_PATTERNS: LazyLock<BTreeMap<TagFamily, Regex>> = LazyLock::new(|| {
    TagFamily::ALL
        .into_iter()
        .map(|family| (family, Regex::new(&family.pattern()).expect("invalid tag pattern")))
        .collect()
});

static HEAD_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("invalid regex"));
static HEAD_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head\s*>").expect("invalid regex"));
static BODY_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<body(?:\s[^>]*)?>").expect("invalid regex"));

/// One removed duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Conflict {
    pub tag: TagFamily,
    pub message: String,
}

/// Why a body was passed through without scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    ContentType,
    TooLarge,
    NoHead,
}

/// Result of running the guard over one response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GuardOutcome {
    pub body: String,
    /// Removed duplicates in document order.
    pub conflicts: Vec<Conflict>,
    pub skipped: Option<SkipReason>,
}

impl GuardOutcome {
    fn skipped(body: String, reason: SkipReason) -> Self {
        Self { body, conflicts: Vec::new(), skipped: Some(reason) }
    }
}

/// Response post-processor removing duplicate SEO tags.
#[derive(Debug, Clone)]
pub struct ConflictGuard {
    enabled: bool,
    max_size_bytes: Option<usize>,
    parse_head_only: bool,
    content_types: Vec<String>,
    debug: bool,
}

impl ConflictGuard {
    pub fn new(config: &ConflictGuardConfig, debug: bool) -> Self {
        Self {
            enabled: config.enabled,
            max_size_bytes: (config.max_size_kb > 0).then(|| config.max_size_kb.saturating_mul(1024)),
            parse_head_only: config.parse_head_only,
            content_types: config.content_types.iter().map(|t| media_type(t)).collect(),
            debug,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.conflict_guard, config.debug)
    }

    /// Whether a `Content-Type` header value names a guarded media type.
    ///
    /// Parameters such as `charset` are ignored.
    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        let media = media_type(content_type);
        self.content_types.iter().any(|allowed| *allowed == media)
    }

    /// Deduplicate tags in a response body.
    ///
    /// A `None` content type skips the media type check.
    pub fn process(&self, body: String, content_type: Option<&str>) -> GuardOutcome {
        if !self.enabled {
            return GuardOutcome::skipped(body, SkipReason::Disabled);
        }

        if let Some(content_type) = content_type
            && !self.accepts_content_type(content_type)
        {
            return GuardOutcome::skipped(body, SkipReason::ContentType);
        }

        if let Some(max) = self.max_size_bytes
            && body.len() > max
        {
            tracing::debug!(size = body.len(), max_size = max, "Skipping large response");
            return GuardOutcome::skipped(body, SkipReason::TooLarge);
        }

        let range = if self.parse_head_only {
            match head_range(&body) {
                Some(range) => range,
                None => return GuardOutcome::skipped(body, SkipReason::NoHead),
            }
        } else {
            0..body.len()
        };

        let (segment, conflicts) = remove_duplicates(&body[range.clone()]);

        if conflicts.is_empty() {
            return GuardOutcome { body, conflicts, skipped: None };
        }

        tracing::debug!(count = conflicts.len(), "Removed duplicate tags");

        let mut output = String::with_capacity(body.len());
        output.push_str(&body[..range.start]);
        output.push_str(&segment);
        output.push_str(&body[range.end..]);

        if self.debug {
            output = inject_warnings(&output, &conflicts);
        }

        GuardOutcome { body: output, conflicts, skipped: None }
    }
}

/// Media type of a header value, lowercased, parameters dropped.
fn media_type(value: &str) -> String {
    value.split([';', ',', ' ']).next().unwrap_or_default().trim().to_lowercase()
}

/// Byte range from `<head ...>` through the first following `</head>`.
fn head_range(html: &str) -> Option<std::ops::Range<usize>> {
    let open = HEAD_OPEN.find(html)?;
    let close = HEAD_CLOSE.find_at(html, open.end())?;
    Some(open.start()..close.end())
}

fn remove_duplicates(segment: &str) -> (String, Vec<Conflict>) {
    let mut removals: Vec<(usize, usize, TagFamily)> = Vec::new();

    for family in TagFamily::ALL {
        removals.extend(family.regex().find_iter(segment).skip(1).map(|m| (m.start(), m.end(), family)));
    }

    removals.sort_by_key(|(start, _, _)| *start);

    let mut output = String::with_capacity(segment.len());
    let mut conflicts = Vec::with_capacity(removals.len());
    let mut cursor = 0;

    for (start, end, family) in removals {
        if start < cursor {
            continue;
        }
        output.push_str(&segment[cursor..start]);
        cursor = end;
        conflicts.push(Conflict { tag: family, message: family.conflict_message() });
    }
    output.push_str(&segment[cursor..]);

    (output, conflicts)
}

fn inject_warnings(html: &str, conflicts: &[Conflict]) -> String {
    let mut messages: Vec<&str> = Vec::new();
    for conflict in conflicts {
        if !messages.contains(&conflict.message.as_str()) {
            messages.push(&conflict.message);
        }
    }

    let list = serde_json::to_string(&messages).unwrap_or_else(|_| "[]".to_string()).replace("</", r"<\/");
    let script = format!(
        "<script>if(console&&console.warn){{console.warn('pagemeta ConflictGuard: Duplicate meta tags detected', {list});}}</script>"
    );

    if let Some(close) = HEAD_CLOSE.find(html) {
        return [&html[..close.start()], &script, &html[close.start()..]].concat();
    }
    if let Some(body) = BODY_OPEN.find(html) {
        return [&html[..body.end()], &script, &html[body.end()..]].concat();
    }
    format!("{script}{html}")
}
