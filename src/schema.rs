//! Index settings and field mapping for item documents.

use serde_json::{json, Value};

use crate::config::IndexConfig;

/// Declared field types, in mapping order.
pub const FIELD_TYPES: &[(&str, &str)] = &[
    ("name", "keyword"),
    ("description", "text"),
    ("stock", "long"),
    ("image", "keyword"),
    ("created", "date"),
    ("tags", "keyword"),
    ("location", "geo_point"),
    ("suggest", "completion"),
];

/// The create-index body: settings plus the item mapping.
///
/// `description` is stored and has fielddata enabled so it can back term
/// aggregations.
pub fn index_definition(config: &IndexConfig) -> Value {
    json!({
        "settings": {
            "number_of_shards": config.shards,
            "number_of_replicas": config.replicas
        },
        "mappings": {
            "properties": {
                "name": { "type": "keyword" },
                "description": {
                    "type": "text",
                    "store": true,
                    "fielddata": true
                },
                "stock": { "type": "long" },
                "image": { "type": "keyword" },
                "created": { "type": "date" },
                "tags": { "type": "keyword" },
                "location": { "type": "geo_point" },
                "suggest": { "type": "completion" }
            }
        }
    })
}

/// Compare a live `mappings` object against [`FIELD_TYPES`].
///
/// Returns one entry per field whose type differs or is missing, formatted
/// as `field: expected X, found Y`.
pub fn mapping_mismatches(mappings: &Value) -> Vec<String> {
    let properties = mappings.get("properties");
    FIELD_TYPES
        .iter()
        .filter_map(|(field, expected)| {
            let found = properties
                .and_then(|p| p.get(*field))
                .and_then(|f| f.get("type"))
                .and_then(Value::as_str);
            match found {
                Some(t) if t == *expected => None,
                Some(t) => Some(format!("{}: expected {}, found {}", field, expected, t)),
                None => Some(format!("{}: expected {}, found nothing", field, expected)),
            }
        })
        .collect()
}
