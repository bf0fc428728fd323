//! Item operations over a [`SearchIndex`].
//!
//! [`Catalog`] is the single handle the CLI and HTTP server use to read and
//! write items. It owns the index client and the search window settings and
//! is constructed once at startup.
//!
//! # Decode policy
//!
//! Stored sources are decoded into [`Item`] explicitly. In search results a
//! hit that fails to decode is logged and skipped, and the page reports how
//! many were skipped. A single-document lookup that fails to decode is an
//! error.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::json;

use crate::config::SearchConfig;
use crate::index::{DocumentUpdate, Hit, SearchIndex, TermQuery, UpdateOutcome};
use crate::models::{Item, ItemRecord, SearchPage, Suggest};

/// Offset/limit window for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub from: u32,
    /// Requested size; `None` uses the configured default.
    pub size: Option<u32>,
}

/// Largest stock increment accepted; stock is a signed 64-bit `long` in the index.
pub const MAX_STOCK_INCREMENT: u64 = i64::MAX as u64;

#[derive(Clone)]
pub struct Catalog {
    index: Arc<dyn SearchIndex>,
    search: SearchConfig,
}

impl Catalog {
    pub fn new(index: Arc<dyn SearchIndex>, search: SearchConfig) -> Self {
        Self { index, search }
    }

    /// Create a new item with stock 1 and a server-generated id.
    pub async fn create_item(&self, name: &str, description: &str) -> Result<ItemRecord> {
        let name = name.trim();
        if name.is_empty() {
            bail!("item name must not be empty");
        }

        let item = Item {
            stock: 1,
            created: Some(Utc::now()),
            suggest: Some(Suggest::from_name(name)),
            ..Item::new(name, description)
        };
        let id = self
            .index
            .index_document(None, &serde_json::to_value(&item)?)
            .await
            .with_context(|| format!("Failed to index item '{}'", name))?;
        tracing::info!(index = self.index.name(), id = %id, name, "indexed item");

        Ok(ItemRecord {
            id,
            version: None,
            item,
        })
    }

    /// Replace the stored document under `id` with `item`.
    pub async fn overwrite_item(&self, id: &str, item: &Item) -> Result<ItemRecord> {
        let id = self
            .index
            .index_document(Some(id), &serde_json::to_value(item)?)
            .await
            .with_context(|| format!("Failed to overwrite item {}", id))?;
        Ok(ItemRecord {
            id,
            version: None,
            item: item.clone(),
        })
    }

    /// Fetch one item. An empty id or a missing document is `Ok(None)`.
    pub async fn get_item(&self, id: &str) -> Result<Option<ItemRecord>> {
        if id.is_empty() {
            return Ok(None);
        }
        let hit = self
            .index
            .get_document(id)
            .await
            .with_context(|| format!("Failed to get item {}", id))?;
        match hit {
            Some(hit) => {
                let record = decode_hit(hit)
                    .with_context(|| format!("Stored document {} is not a valid item", id))?;
                tracing::debug!(id, version = ?record.version, "got item");
                Ok(Some(record))
            }
            None => {
                tracing::info!(index = self.index.name(), id, "item not found");
                Ok(None)
            }
        }
    }

    /// Rename an item in place. Returns the updated record, or `None` when
    /// the id is unknown.
    pub async fn rename_item(&self, id: &str, name: &str) -> Result<Option<ItemRecord>> {
        let name = name.trim();
        if name.is_empty() {
            bail!("item name must not be empty");
        }
        let update = DocumentUpdate::Merge(json!({
            "name": name,
            "suggest": Suggest::from_name(name),
        }));
        self.apply(id, &update).await
    }

    /// Add `by` to the item's stock inside the index. Concurrent increments
    /// are all applied; the count is never read back and rewritten here.
    pub async fn increment_stock(&self, id: &str, by: u64) -> Result<Option<ItemRecord>> {
        if !(1..=MAX_STOCK_INCREMENT).contains(&by) {
            bail!("stock increment must be between 1 and {}", MAX_STOCK_INCREMENT);
        }
        let update = DocumentUpdate::IncrementStock { by, upsert: None };
        self.apply(id, &update).await
    }

    async fn apply(&self, id: &str, update: &DocumentUpdate) -> Result<Option<ItemRecord>> {
        if id.is_empty() {
            return Ok(None);
        }
        let outcome = self
            .index
            .update_document(id, update)
            .await
            .with_context(|| format!("Failed to update item {}", id))?;
        match outcome {
            UpdateOutcome::Updated { version } => {
                tracing::info!(id, ?version, "updated item");
                self.get_item(id).await
            }
            UpdateOutcome::NotFound => {
                tracing::info!(index = self.index.name(), id, "update target not found");
                Ok(None)
            }
        }
    }

    /// Exact-match search on `name`, sorted ascending by name.
    ///
    /// A blank name returns an empty page without querying the index. The
    /// page size is clamped to `search.max_page_size`.
    pub async fn search_by_name(&self, name: &str, page: Page) -> Result<SearchPage> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(SearchPage::default());
        }

        let size = page
            .size
            .unwrap_or(self.search.page_size)
            .clamp(1, self.search.max_page_size);
        let query = TermQuery::sorted("name", name, page.from, size);
        let hits = self
            .index
            .search(&query)
            .await
            .with_context(|| format!("Failed to search items named '{}'", name))?;

        let mut result = SearchPage {
            total: hits.total,
            ..SearchPage::default()
        };
        for hit in hits.hits {
            let id = hit.id.clone();
            match decode_hit(hit) {
                Ok(record) => result.items.push(record),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "skipping malformed item document");
                    result.skipped += 1;
                }
            }
        }

        if result.items.is_empty() && result.skipped == 0 {
            tracing::info!(name, "found no items");
        }
        Ok(result)
    }
}

fn decode_hit(hit: Hit) -> Result<ItemRecord> {
    let item: Item = serde_json::from_value(hit.source)?;
    Ok(ItemRecord {
        id: hit.id,
        version: hit.version,
        item,
    })
}
