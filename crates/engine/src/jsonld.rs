//! JSON-LD normalization.
//!
//! Stored structured data comes in several shapes: a list of objects, a bare
//! object from older records, a JSON string, and a separate breadcrumb object.
//! [`normalize_json_ld`] folds all of them into one ordered list of objects;
//! nothing downstream looks at the stored shape again.

use serde_json::{Map, Value, json};

/// A single structured-data object.
pub type JsonLdItem = Map<String, Value>;

/// Fold stored `jsonld` and `breadcrumb_jsonld` into an ordered list of objects.
///
/// Order is jsonld items first, then the breadcrumb. Null and non-object
/// entries are dropped.
pub fn normalize_json_ld(jsonld: Option<&Value>, breadcrumb: Option<&Value>) -> Vec<JsonLdItem> {
    let mut items = Vec::new();

    if let Some(value) = jsonld {
        collect_items(value, &mut items, true);
    }
    if let Some(value) = breadcrumb {
        collect_items(value, &mut items, true);
    }

    items
}

fn collect_items(value: &Value, items: &mut Vec<JsonLdItem>, decode_strings: bool) {
    match value {
        Value::Object(map) => items.push(map.clone()),
        Value::Array(values) => {
            for entry in values {
                match entry {
                    Value::Object(map) => items.push(map.clone()),
                    Value::Null => {}
                    other => tracing::warn!(entry = %other, "Dropping non-object JSON-LD entry"),
                }
            }
        }
        Value::String(raw) if decode_strings => match serde_json::from_str::<Value>(raw) {
            Ok(decoded) => collect_items(&decoded, items, false),
            Err(e) => tracing::warn!(error = %e, "Dropping undecodable JSON-LD string"),
        },
        Value::Null => {}
        other => tracing::warn!(entry = %other, "Dropping non-object JSON-LD value"),
    }
}

/// Structured data synthesized for pages without a record.
pub fn default_json_ld(site_name: &str, base_url: &str) -> Vec<JsonLdItem> {
    let items = [
        json!({
            "@context": "https://schema.org",
            "@type": "Organization",
            "name": site_name,
            "url": base_url,
        }),
        json!({
            "@context": "https://schema.org",
            "@type": "WebSite",
            "name": site_name,
            "url": base_url,
        }),
        json!({
            "@context": "https://schema.org",
            "@type": "BreadcrumbList",
            "itemListElement": [{
                "@type": "ListItem",
                "position": 1,
                "name": "Home",
                "item": base_url,
            }],
        }),
    ];

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_object_becomes_list() {
        let jsonld = json!({"@type": "Product", "name": "Room"});
        let items = normalize_json_ld(Some(&jsonld), None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["@type"], "Product");
    }

    #[test]
    fn test_legacy_object_and_breadcrumb_keep_order() {
        let jsonld = json!({"@type": "Product"});
        let breadcrumb = json!({"@type": "BreadcrumbList"});
        let items = normalize_json_ld(Some(&jsonld), Some(&breadcrumb));

        let types: Vec<_> = items.iter().map(|i| i["@type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["Product", "BreadcrumbList"]);
    }

    #[test]
    fn test_null_and_scalar_entries_filtered() {
        let jsonld = json!([{"@type": "A"}, null, 42, "text", [1], {"@type": "B"}]);
        let items = normalize_json_ld(Some(&jsonld), Some(&Value::Null));

        let types: Vec<_> = items.iter().map(|i| i["@type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["A", "B"]);
    }

    #[test]
    fn test_json_string_decoded_once() {
        let jsonld = Value::String(r#"[{"@type": "A"}]"#.into());
        assert_eq!(normalize_json_ld(Some(&jsonld), None).len(), 1);

        let nested = Value::String(serde_json::to_string(&Value::String(r#"{"@type": "A"}"#.into())).unwrap());
        assert!(normalize_json_ld(Some(&nested), None).is_empty());

        let garbage = Value::String("{not json".into());
        assert!(normalize_json_ld(Some(&garbage), None).is_empty());
    }

    #[test]
    fn test_absent_values_give_empty_list() {
        assert!(normalize_json_ld(None, None).is_empty());
    }

    #[test]
    fn test_default_json_ld() {
        let items = default_json_ld("Rooms", "https://example.com");
        let types: Vec<_> = items.iter().map(|i| i["@type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["Organization", "WebSite", "BreadcrumbList"]);
        assert_eq!(items[0]["url"], "https://example.com");
        assert_eq!(items[2]["itemListElement"][0]["position"], 1);
        assert_eq!(items[2]["itemListElement"][0]["item"], "https://example.com");
    }
}
