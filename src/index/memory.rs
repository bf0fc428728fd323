//! In-memory [`SearchIndex`] for tests and the `memory` backend.
//!
//! Documents live in a `BTreeMap` behind a `parking_lot::RwLock`. Updates run
//! under the write lock, which gives the same per-document atomicity the
//! Elasticsearch update API provides. Term queries compare the stored JSON
//! value exactly (or any element of an array value).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};

use super::{
    BackendInfo, CreateOutcome, DocumentUpdate, Hit, Hits, SearchIndex, TermQuery, UpdateOutcome,
};

struct StoredDoc {
    version: i64,
    source: Value,
}

struct State {
    mappings: Value,
    docs: BTreeMap<String, StoredDoc>,
}

/// In-memory index.
pub struct MemoryIndex {
    name: String,
    state: RwLock<Option<State>>,
    create_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl MemoryIndex {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(None),
            create_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }

    /// Number of `create` calls made, including ones that found the index present.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Number of stored documents, or `None` when the index does not exist.
    pub fn len(&self) -> Option<usize> {
        self.state.read().as_ref().map(|s| s.docs.len())
    }

    fn missing_index(&self) -> anyhow::Error {
        anyhow!("no such index [{}]", self.name)
    }
}

fn matches_term(value: Option<&Value>, term: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == term,
        Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(term)),
        Some(other) => other.to_string() == term,
        None => false,
    }
}

fn sort_key(source: &Value, field: &str) -> String {
    match source.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn info(&self) -> Result<BackendInfo> {
        Ok(BackendInfo {
            backend: "memory".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.state.read().is_some())
    }

    async fn create(&self, body: &Value) -> Result<CreateOutcome> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write();
        if state.is_some() {
            return Ok(CreateOutcome::AlreadyExists);
        }
        *state = Some(State {
            mappings: body.get("mappings").cloned().unwrap_or_else(|| json!({})),
            docs: BTreeMap::new(),
        });
        Ok(CreateOutcome::Created)
    }

    async fn mapping(&self) -> Result<Value> {
        self.state
            .read()
            .as_ref()
            .map(|s| s.mappings.clone())
            .ok_or_else(|| self.missing_index())
    }

    async fn delete(&self) -> Result<bool> {
        Ok(self.state.write().take().is_some())
    }

    async fn index_document(&self, id: Option<&str>, source: &Value) -> Result<String> {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or_else(|| self.missing_index())?;
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let version = state.docs.get(&id).map(|d| d.version + 1).unwrap_or(1);
        state.docs.insert(
            id.clone(),
            StoredDoc {
                version,
                source: source.clone(),
            },
        );
        Ok(id)
    }

    async fn get_document(&self, id: &str) -> Result<Option<Hit>> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or_else(|| self.missing_index())?;
        Ok(state.docs.get(id).map(|d| Hit {
            id: id.to_string(),
            version: Some(d.version),
            source: d.source.clone(),
        }))
    }

    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> Result<UpdateOutcome> {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or_else(|| self.missing_index())?;

        if !state.docs.contains_key(id) {
            return match update {
                DocumentUpdate::IncrementStock {
                    upsert: Some(seed), ..
                } => {
                    state.docs.insert(
                        id.to_string(),
                        StoredDoc {
                            version: 1,
                            source: seed.clone(),
                        },
                    );
                    Ok(UpdateOutcome::Updated { version: Some(1) })
                }
                _ => Ok(UpdateOutcome::NotFound),
            };
        }

        let doc = state
            .docs
            .get_mut(id)
            .ok_or_else(|| anyhow!("document [{}] vanished during update", id))?;

        let source = doc
            .source
            .as_object_mut()
            .ok_or_else(|| anyhow!("document [{}] source is not an object", id))?;
        match update {
            DocumentUpdate::IncrementStock { by, .. } => {
                let current = match source.get("stock") {
                    None | Some(Value::Null) => 0,
                    Some(v) => v
                        .as_u64()
                        .ok_or_else(|| anyhow!("document [{}] has non-numeric stock: {}", id, v))?,
                };
                let stock = current
                    .checked_add(*by)
                    .ok_or_else(|| anyhow!("stock of document [{}] would overflow", id))?;
                source.insert("stock".to_string(), json!(stock));
            }
            DocumentUpdate::Merge(fields) => {
                let Some(fields) = fields.as_object() else {
                    bail!("partial update for [{}] must be an object", id);
                };
                for (key, value) in fields {
                    source.insert(key.clone(), value.clone());
                }
            }
        }
        doc.version += 1;
        Ok(UpdateOutcome::Updated {
            version: Some(doc.version),
        })
    }

    async fn search(&self, query: &TermQuery) -> Result<Hits> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let guard = self.state.read();
        let state = guard.as_ref().ok_or_else(|| self.missing_index())?;

        let mut matched: Vec<Hit> = state
            .docs
            .iter()
            .filter(|(_, d)| matches_term(d.source.get(&query.field), &query.value))
            .map(|(id, d)| Hit {
                id: id.clone(),
                version: Some(d.version),
                source: d.source.clone(),
            })
            .collect();

        if let Some(ref field) = query.sort_by {
            matched.sort_by(|a, b| {
                let ord = sort_key(&a.source, field).cmp(&sort_key(&b.source, field));
                if query.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        let total = matched.len() as u64;
        let hits = matched
            .into_iter()
            .skip(query.from as usize)
            .take(query.size as usize)
            .collect();
        Ok(Hits { total, hits })
    }

    async fn refresh(&self) -> Result<()> {
        if self.state.read().is_none() {
            return Err(self.missing_index());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn created() -> MemoryIndex {
        let index = MemoryIndex::new("items");
        index
            .create(&json!({"mappings": {"properties": {}}}))
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_create_twice_reports_existing() {
        let index = created().await;
        assert_eq!(
            index.create(&json!({})).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(index.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_operations_on_missing_index_fail() {
        let index = MemoryIndex::new("items");
        assert!(!index.exists().await.unwrap());
        assert!(index.get_document("1").await.is_err());
        assert!(index
            .index_document(None, &json!({"name": "x"}))
            .await
            .is_err());
        assert!(!index.delete().await.unwrap());
    }

    #[tokio::test]
    async fn test_generated_ids_are_unique() {
        let index = created().await;
        let a = index.index_document(None, &json!({})).await.unwrap();
        let b = index.index_document(None, &json!({})).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(index.len(), Some(2));
    }

    #[tokio::test]
    async fn test_overwrite_bumps_version() {
        let index = created().await;
        index
            .index_document(Some("1"), &json!({"name": "a"}))
            .await
            .unwrap();
        index
            .index_document(Some("1"), &json!({"name": "b"}))
            .await
            .unwrap();
        let hit = index.get_document("1").await.unwrap().unwrap();
        assert_eq!(hit.version, Some(2));
        assert_eq!(hit.source["name"], json!("b"));
    }

    #[tokio::test]
    async fn test_increment_missing_stock_starts_at_zero() {
        let index = created().await;
        index
            .index_document(Some("2"), &json!({"name": "Laptop"}))
            .await
            .unwrap();
        let update = DocumentUpdate::IncrementStock { by: 3, upsert: None };
        index.update_document("2", &update).await.unwrap();
        let hit = index.get_document("2").await.unwrap().unwrap();
        assert_eq!(hit.source["stock"], json!(3));
    }

    #[tokio::test]
    async fn test_increment_overflow_is_error() {
        let index = created().await;
        index
            .index_document(Some("1"), &json!({"name": "Chair", "stock": 5}))
            .await
            .unwrap();
        let update = DocumentUpdate::IncrementStock {
            by: u64::MAX,
            upsert: None,
        };
        let err = index.update_document("1", &update).await.unwrap_err();
        assert!(err.to_string().contains("overflow"));

        let hit = index.get_document("1").await.unwrap().unwrap();
        assert_eq!(hit.source["stock"], json!(5));
        assert_eq!(hit.version, Some(1));
    }

    #[tokio::test]
    async fn test_increment_upsert_inserts_seed() {
        let index = created().await;
        let update = DocumentUpdate::IncrementStock {
            by: 1,
            upsert: Some(json!({"stock": 0})),
        };
        let outcome = index.update_document("7", &update).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Updated { version: Some(1) });
        let hit = index.get_document("7").await.unwrap().unwrap();
        assert_eq!(hit.source, json!({"stock": 0}));
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let index = created().await;
        let update = DocumentUpdate::Merge(json!({"name": "x"}));
        assert_eq!(
            index.update_document("nope", &update).await.unwrap(),
            UpdateOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_term_matches_array_values() {
        let index = created().await;
        index
            .index_document(Some("1"), &json!({"tags": ["red", "wood"]}))
            .await
            .unwrap();
        let hits = index
            .search(&TermQuery::sorted("tags", "wood", 0, 10))
            .await
            .unwrap();
        assert_eq!(hits.total, 1);
    }

    #[tokio::test]
    async fn test_search_window_and_total() {
        let index = created().await;
        for n in ["d", "b", "a", "c"] {
            index
                .index_document(None, &json!({"kind": "x", "name": n}))
                .await
                .unwrap();
        }
        let mut query = TermQuery::sorted("kind", "x", 1, 2);
        query.sort_by = Some("name".to_string());
        let hits = index.search(&query).await.unwrap();
        assert_eq!(hits.total, 4);
        let names: Vec<&str> = hits
            .hits
            .iter()
            .map(|h| h.source["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }
}
