//! Core data models used throughout Invento.
//!
//! [`Item`] is the document stored in the search index. Its JSON form is the
//! wire format: optional fields are left out when empty, while `name`,
//! `description` and `stock` are always written.

use std::collections::BTreeSet;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// An inventory item as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Keyword identifier; exact-match search and sort key.
    pub name: String,
    /// Free text description.
    pub description: String,
    /// Quantity on hand. Documents written without a stock count read as 0.
    #[serde(default)]
    pub stock: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Creation time, set once by [`Catalog::create_item`](crate::catalog::Catalog::create_item).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Completion input derived from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggest: Option<Suggest>,
}

impl Item {
    /// A bare item with only the always-present fields set.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            stock: 0,
            image: None,
            created: None,
            tags: BTreeSet::new(),
            location: None,
            suggest: None,
        }
    }
}

/// Geo point in the object form Elasticsearch accepts for `geo_point`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Value of a `completion` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggest {
    pub input: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

impl Suggest {
    pub fn from_name(name: &str) -> Self {
        Self {
            input: vec![name.to_string()],
            weight: None,
        }
    }
}

/// A decoded item together with the id and version the index assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub id: String,
    pub version: Option<i64>,
    pub item: Item,
}

/// One page of name-search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Total matching documents reported by the index.
    pub total: u64,
    pub items: Vec<ItemRecord>,
    /// Hits dropped because their source did not decode as an [`Item`].
    pub skipped: usize,
}

/// Landing page context.
#[derive(Debug, Clone)]
pub struct Welcome {
    pub name: String,
    pub time: String,
}

impl Welcome {
    pub fn now(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time: Local::now().format("%b %e %H:%M:%S").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn full_item() -> Item {
        Item {
            name: "Chair".to_string(),
            description: "A green chair imported from the USA.".to_string(),
            stock: 4,
            image: Some("chair.png".to_string()),
            created: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()),
            tags: ["furniture".to_string(), "green".to_string()]
                .into_iter()
                .collect(),
            location: Some(GeoPoint {
                lat: 28.1,
                lon: -15.4,
            }),
            suggest: Some(Suggest::from_name("Chair")),
        }
    }

    #[test]
    fn test_round_trip_full_item() {
        let item = full_item();
        let value = serde_json::to_value(&item).unwrap();
        let back: Item = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(back, item);

        let obj = value.as_object().unwrap();
        for key in [
            "name",
            "description",
            "stock",
            "image",
            "created",
            "tags",
            "location",
            "suggest",
        ] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
    }

    #[test]
    fn test_empty_optionals_are_omitted() {
        let item = Item::new("Desk", "");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({ "name": "Desk", "description": "", "stock": 0 })
        );
        let back: Item = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_missing_stock_reads_as_zero() {
        let item: Item =
            serde_json::from_value(json!({"name": "Laptop", "description": "Macbook Pro 15-inch"}))
                .unwrap();
        assert_eq!(item.stock, 0);
        assert!(item.tags.is_empty());
    }

    #[test]
    fn test_malformed_documents_fail_to_decode() {
        assert!(serde_json::from_value::<Item>(json!({"stock": 0})).is_err());
        assert!(serde_json::from_value::<Item>(json!({"name": 7, "description": ""})).is_err());
        assert!(serde_json::from_value::<Item>(
            json!({"name": "a", "description": "", "stock": -1})
        )
        .is_err());
    }

    #[test]
    fn test_created_serializes_as_rfc3339() {
        let value = serde_json::to_value(full_item()).unwrap();
        assert_eq!(value["created"], json!("2024-03-01T12:30:00Z"));
        assert_eq!(value["suggest"], json!({"input": ["Chair"]}));
    }

    #[test]
    fn test_welcome_time_is_local_clock() {
        let stamp = |t: DateTime<Local>| t.format("%b %e %H:%M:%S").to_string();
        let before = stamp(Local::now());
        let welcome = Welcome::now("Ana");
        let after = stamp(Local::now());

        assert_eq!(welcome.name, "Ana");
        assert_eq!(welcome.time.len(), "Jan  2 15:04:05".len());
        assert!(welcome.time == before || welcome.time == after, "{}", welcome.time);
    }
}
