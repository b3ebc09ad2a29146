//! Head markup rendering.

use crate::guard::TagFamily;
use crate::key::QueryIdentity;
use crate::metadata::{MetaField, ResolvedMetadata};
use crate::resolve::ResolutionSource;

const SEPARATOR: &str = "\n    ";

enum Markup {
    Title,
    Name(&'static str),
    Property(&'static str),
    HttpEquiv(&'static str),
    Canonical,
}

struct HeadTag {
    field: MetaField,
    markup: Markup,
    /// Family used to detect a tag already present in the output buffer.
    family: Option<TagFamily>,
}

const fn tag(field: MetaField, markup: Markup, family: Option<TagFamily>) -> HeadTag {
    HeadTag { field, markup, family }
}

/// Emission order of head tags.
const HEAD_TAGS: &[HeadTag] = &[
    tag(MetaField::Title, Markup::Title, Some(TagFamily::Title)),
    tag(MetaField::Description, Markup::Name("description"), Some(TagFamily::Description)),
    tag(MetaField::Keywords, Markup::Name("keywords"), None),
    tag(MetaField::Robots, Markup::Name("robots"), None),
    tag(MetaField::Language, Markup::HttpEquiv("content-language"), None),
    tag(MetaField::CanonicalUrl, Markup::Canonical, Some(TagFamily::Canonical)),
    tag(MetaField::OgTitle, Markup::Property("og:title"), Some(TagFamily::OgTitle)),
    tag(MetaField::OgDescription, Markup::Property("og:description"), Some(TagFamily::OgDescription)),
    tag(MetaField::OgImage, Markup::Property("og:image"), Some(TagFamily::OgImage)),
    tag(MetaField::OgType, Markup::Property("og:type"), None),
    tag(MetaField::CanonicalUrl, Markup::Property("og:url"), None),
    tag(MetaField::OgSiteName, Markup::Property("og:site_name"), Some(TagFamily::OgSiteName)),
    tag(MetaField::TwitterCard, Markup::Name("twitter:card"), Some(TagFamily::TwitterCard)),
    tag(MetaField::TwitterTitle, Markup::Name("twitter:title"), Some(TagFamily::TwitterTitle)),
    tag(MetaField::TwitterDescription, Markup::Name("twitter:description"), Some(TagFamily::TwitterDescription)),
    tag(MetaField::TwitterImage, Markup::Name("twitter:image"), Some(TagFamily::TwitterImage)),
    tag(MetaField::TwitterSite, Markup::Name("twitter:site"), Some(TagFamily::TwitterSite)),
    tag(MetaField::TwitterCreator, Markup::Name("twitter:creator"), Some(TagFamily::TwitterCreator)),
    tag(MetaField::Author, Markup::Name("author"), Some(TagFamily::Author)),
    tag(MetaField::ThemeColor, Markup::Name("theme-color"), Some(TagFamily::ThemeColor)),
];

/// Render head tags for `meta`.
pub fn render_head(meta: &ResolvedMetadata) -> String {
    render_head_into(meta, "")
}

/// Render head tags, skipping families already present in `existing`.
pub fn render_head_into(meta: &ResolvedMetadata, existing: &str) -> String {
    let mut lines = Vec::new();

    for head_tag in HEAD_TAGS {
        let Some(value) = meta.get(head_tag.field).filter(|v| !v.is_empty()) else {
            continue;
        };
        if let Some(family) = head_tag.family
            && !existing.is_empty()
            && family.is_present(existing)
        {
            tracing::debug!(tag = family.name(), "Tag already present, not emitting");
            continue;
        }

        let value = escape_html(value);
        lines.push(match head_tag.markup {
            Markup::Title => format!("<title>{value}</title>"),
            Markup::Name(name) => format!(r#"<meta name="{name}" content="{value}">"#),
            Markup::Property(property) => format!(r#"<meta property="{property}" content="{value}">"#),
            Markup::HttpEquiv(header) => format!(r#"<meta http-equiv="{header}" content="{value}">"#),
            Markup::Canonical => format!(r#"<link rel="canonical" href="{value}">"#),
        });
    }

    lines.join(SEPARATOR)
}

/// One `application/ld+json` script per item.
///
/// `</` inside the JSON is written as `<\/` so no value can close the script.
pub fn render_json_ld(meta: &ResolvedMetadata) -> String {
    meta.jsonld
        .iter()
        .filter_map(|item| match serde_json::to_string(item) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unserializable JSON-LD item");
                None
            }
        })
        .map(|json| format!(r#"<script type="application/ld+json">{}</script>"#, json.replace("</", r"<\/")))
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// HTML comment describing how the document was resolved.
pub fn render_debug(identity: &QueryIdentity, meta: &ResolvedMetadata, source: ResolutionSource) -> String {
    let lines = [
        format!("Domain: {}", identity.domain),
        format!("Path: {}", identity.path),
        format!("Query Hash: {}", identity.query_hash.as_deref().unwrap_or("null")),
        format!("Cache Key: {}", identity.cache_key),
        format!("Title: {}", meta.title.as_deref().unwrap_or("null")),
        format!("Source: {source}"),
    ];
    let body = lines.join(SEPARATOR).replace("--", "- -");
    format!("{SEPARATOR}<!-- pagemeta Debug:{SEPARATOR}{body}{SEPARATOR}-->\n")
}

/// Escape text for use in element content and quoted attributes.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            c => escaped.push(c),
        }
    }
    escaped
}
