//! Index lifecycle: ensure, reset-and-seed, drop.
//!
//! [`ensure_index`] is the default startup path and never destroys data.
//! [`reset_and_seed`] deletes and rebuilds the index and is only reachable
//! through `invento seed --yes` or `invento serve --reset`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::config::IndexConfig;
use crate::index::{CreateOutcome, DocumentUpdate, SearchIndex, UpdateOutcome};
use crate::models::Item;
use crate::schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    Created,
    AlreadyPresent,
}

/// Make sure the index exists with the item mapping.
///
/// An existing index is checked, never modified: a field with the wrong type
/// (or missing) aborts with an error listing the offending fields.
pub async fn ensure_index(index: &dyn SearchIndex, config: &IndexConfig) -> Result<Bootstrap> {
    let exists = index
        .exists()
        .await
        .with_context(|| format!("Failed to check whether index '{}' exists", index.name()))?;

    if !exists {
        let outcome = index
            .create(&schema::index_definition(config))
            .await
            .with_context(|| format!("Failed to create index '{}'", index.name()))?;
        if outcome == CreateOutcome::Created {
            tracing::info!(index = index.name(), "created index");
            return Ok(Bootstrap::Created);
        }
        tracing::info!(index = index.name(), "index created concurrently");
    }

    verify_mapping(index).await?;
    Ok(Bootstrap::AlreadyPresent)
}

async fn verify_mapping(index: &dyn SearchIndex) -> Result<()> {
    let mappings = index
        .mapping()
        .await
        .with_context(|| format!("Failed to read mapping of index '{}'", index.name()))?;
    let problems = schema::mapping_mismatches(&mappings);
    if !problems.is_empty() {
        bail!(
            "Index '{}' has an incompatible mapping ({}). Run `invento seed --yes` to rebuild it.",
            index.name(),
            problems.join("; ")
        );
    }
    Ok(())
}

/// Drop the whole index. Returns `false` when there was nothing to drop.
pub async fn drop_index(index: &dyn SearchIndex) -> Result<bool> {
    let existed = index
        .delete()
        .await
        .with_context(|| format!("Failed to delete index '{}'", index.name()))?;
    if existed {
        tracing::warn!(index = index.name(), "deleted index");
    }
    Ok(existed)
}

/// One seed document, optionally with a fixed id.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub item: Item,
}

/// Stock increment applied after the seed documents are written.
#[derive(Debug, Clone)]
pub struct SeedIncrement {
    pub id: String,
    pub by: u64,
}

#[derive(Debug, Clone)]
pub struct SeedSet {
    pub items: Vec<SeedItem>,
    pub increments: Vec<SeedIncrement>,
}

impl SeedSet {
    /// The demo catalog: a chair and a laptop, then one chair restocked.
    pub fn demo() -> Self {
        Self {
            items: vec![
                SeedItem {
                    id: Some("1".to_string()),
                    item: Item::new("Chair", "A green chair imported from the USA."),
                },
                SeedItem {
                    id: Some("2".to_string()),
                    item: Item::new("Laptop", "Macbook Pro 15-inch"),
                },
            ],
            increments: vec![SeedIncrement {
                id: "1".to_string(),
                by: 1,
            }],
        }
    }

    /// Load seed items from a JSON array file. File seeds carry no increments.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
        let items: Vec<SeedItem> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse seed file: {}", path.display()))?;
        Ok(Self {
            items,
            increments: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub dropped_existing: bool,
    pub ids: Vec<String>,
}

/// Delete the index, recreate it, and write the seed set.
///
/// Destructive: every document in the index is lost.
pub async fn reset_and_seed(
    index: &dyn SearchIndex,
    config: &IndexConfig,
    seed: &SeedSet,
) -> Result<SeedReport> {
    let dropped_existing = drop_index(index).await?;

    let outcome = index
        .create(&schema::index_definition(config))
        .await
        .with_context(|| format!("Failed to create index '{}'", index.name()))?;
    if outcome == CreateOutcome::AlreadyExists {
        bail!(
            "Index '{}' reappeared while reseeding; another process may be writing to it",
            index.name()
        );
    }

    let mut ids = Vec::with_capacity(seed.items.len());
    for entry in &seed.items {
        let source = serde_json::to_value(&entry.item)?;
        let id = index
            .index_document(entry.id.as_deref(), &source)
            .await
            .with_context(|| format!("Failed to index seed item '{}'", entry.item.name))?;
        tracing::info!(index = index.name(), id = %id, name = %entry.item.name, "indexed seed item");
        ids.push(id);
    }

    for inc in &seed.increments {
        let upsert = seed_upsert(seed, &inc.id)?;
        let update = DocumentUpdate::IncrementStock {
            by: inc.by,
            upsert: Some(upsert),
        };
        match index.update_document(&inc.id, &update).await? {
            UpdateOutcome::Updated { version } => {
                tracing::info!(id = %inc.id, ?version, by = inc.by, "incremented seed stock");
            }
            UpdateOutcome::NotFound => bail!("Seed item '{}' disappeared during seeding", inc.id),
        }
    }

    index.refresh().await?;

    Ok(SeedReport {
        dropped_existing,
        ids,
    })
}

/// The document inserted if an increment targets an id that was not seeded.
fn seed_upsert(seed: &SeedSet, id: &str) -> Result<Value> {
    let item = seed
        .items
        .iter()
        .find(|s| s.id.as_deref() == Some(id))
        .map(|s| s.item.clone())
        .unwrap_or_else(|| Item::new(id, ""));
    Ok(serde_json::to_value(item)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;
    use serde_json::json;

    fn config() -> IndexConfig {
        IndexConfig {
            backend: "memory".to_string(),
            ..IndexConfig::default()
        }
    }

    #[tokio::test]
    async fn test_ensure_creates_missing_index() {
        let index = MemoryIndex::new("inventopedia");
        let outcome = ensure_index(&index, &config()).await.unwrap();
        assert_eq!(outcome, Bootstrap::Created);
        assert!(index.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let index = MemoryIndex::new("inventopedia");
        ensure_index(&index, &config()).await.unwrap();
        let before = index.mapping().await.unwrap();

        let outcome = ensure_index(&index, &config()).await.unwrap();
        assert_eq!(outcome, Bootstrap::AlreadyPresent);
        assert_eq!(index.create_calls(), 1);
        assert_eq!(index.mapping().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_ensure_keeps_existing_documents() {
        let index = MemoryIndex::new("inventopedia");
        ensure_index(&index, &config()).await.unwrap();
        index
            .index_document(Some("a"), &json!({"name": "Desk", "description": ""}))
            .await
            .unwrap();
        ensure_index(&index, &config()).await.unwrap();
        assert_eq!(index.len(), Some(1));
    }

    #[tokio::test]
    async fn test_ensure_rejects_mapping_drift() {
        let index = MemoryIndex::new("inventopedia");
        index
            .create(&json!({"mappings": {"properties": {"name": {"type": "text"}}}}))
            .await
            .unwrap();
        let err = ensure_index(&index, &config()).await.unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("incompatible mapping"), "{}", msg);
        assert!(msg.contains("name: expected keyword, found text"), "{}", msg);
    }

    #[tokio::test]
    async fn test_reset_and_seed_replaces_contents() {
        let index = MemoryIndex::new("inventopedia");
        ensure_index(&index, &config()).await.unwrap();
        index
            .index_document(Some("old"), &json!({"name": "Old", "description": ""}))
            .await
            .unwrap();

        let report = reset_and_seed(&index, &config(), &SeedSet::demo())
            .await
            .unwrap();
        assert!(report.dropped_existing);
        assert_eq!(report.ids, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(index.len(), Some(2));
        assert!(index.get_document("old").await.unwrap().is_none());

        let chair = index.get_document("1").await.unwrap().unwrap();
        assert_eq!(chair.source["stock"], json!(1));
        let laptop = index.get_document("2").await.unwrap().unwrap();
        assert_eq!(laptop.source["stock"], json!(0));
    }

    #[tokio::test]
    async fn test_reset_on_missing_index() {
        let index = MemoryIndex::new("inventopedia");
        let report = reset_and_seed(&index, &config(), &SeedSet::demo())
            .await
            .unwrap();
        assert!(!report.dropped_existing);
        assert!(schema::mapping_mismatches(&index.mapping().await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_drop_index() {
        let index = MemoryIndex::new("inventopedia");
        assert!(!drop_index(&index).await.unwrap());
        ensure_index(&index, &config()).await.unwrap();
        assert!(drop_index(&index).await.unwrap());
        assert!(!index.exists().await.unwrap());
    }

    #[test]
    fn test_seed_file_parsing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("seed.json");
        std::fs::write(
            &path,
            r#"[{"id": "7", "name": "Lamp", "description": "Desk lamp", "stock": 3, "tags": ["light"]},
                {"name": "Rug", "description": "Wool"}]"#,
        )
        .unwrap();
        let seed = SeedSet::from_file(&path).unwrap();
        assert_eq!(seed.items.len(), 2);
        assert_eq!(seed.items[0].id.as_deref(), Some("7"));
        assert_eq!(seed.items[0].item.stock, 3);
        assert!(seed.items[1].id.is_none());
        assert!(seed.increments.is_empty());
    }
}
