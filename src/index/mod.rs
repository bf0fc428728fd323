//! Search index abstraction.
//!
//! The [`SearchIndex`] trait is the only way Invento talks to its backing
//! store. Each instance is bound to one named index and speaks in raw JSON
//! documents; decoding into [`Item`](crate::models::Item)s happens in
//! [`catalog`](crate::catalog) so that malformed documents stay observable.
//!
//! Two implementations exist:
//! - **[`ElasticIndex`]**: Elasticsearch over its REST API.
//! - **[`MemoryIndex`]**: process-local double with the same contract, used
//!   by tests and the `memory` backend.
//!
//! Use [`connect`] to build the backend named in the configuration.

mod elastic;
mod memory;

pub use elastic::ElasticIndex;
pub use memory::MemoryIndex;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::IndexConfig;

/// A single stored document as returned by get and search.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub version: Option<i64>,
    pub source: Value,
}

/// Result of a search call.
#[derive(Debug, Clone, Default)]
pub struct Hits {
    pub total: u64,
    pub hits: Vec<Hit>,
}

/// Exact-match term query with sort and a from/size window.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    pub field: String,
    pub value: String,
    pub sort_by: Option<String>,
    pub ascending: bool,
    pub from: u32,
    pub size: u32,
}

impl TermQuery {
    /// Term query on `field`, sorted ascending by the same field.
    pub fn sorted(field: &str, value: &str, from: u32, size: u32) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
            sort_by: Some(field.to_string()),
            ascending: true,
            from,
            size,
        }
    }
}

/// Partial update applied inside the index.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentUpdate {
    /// Add `by` to `stock` server-side. When `upsert` is given and the
    /// document does not exist, it is inserted as-is instead.
    IncrementStock { by: u64, upsert: Option<Value> },
    /// Merge the given fields into the stored source.
    Merge(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated { version: Option<i64> },
    NotFound,
}

/// Backend identification, logged at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendInfo {
    pub backend: String,
    pub version: String,
}

/// Abstract search index bound to a single index name.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`info`](SearchIndex::info) | Backend name and version |
/// | [`exists`](SearchIndex::exists) | Whether the index exists |
/// | [`create`](SearchIndex::create) | Create the index from a settings + mappings body |
/// | [`mapping`](SearchIndex::mapping) | The live `mappings` object |
/// | [`delete`](SearchIndex::delete) | Drop the whole index |
/// | [`index_document`](SearchIndex::index_document) | Insert or overwrite a document |
/// | [`get_document`](SearchIndex::get_document) | Fetch one document by id |
/// | [`update_document`](SearchIndex::update_document) | Apply a [`DocumentUpdate`] |
/// | [`search`](SearchIndex::search) | Run a [`TermQuery`] |
/// | [`refresh`](SearchIndex::refresh) | Make recent writes searchable |
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// The index name this instance operates on.
    fn name(&self) -> &str;

    async fn info(&self) -> Result<BackendInfo>;

    async fn exists(&self) -> Result<bool>;

    /// Create the index. An index that already exists is reported as
    /// [`CreateOutcome::AlreadyExists`], not as an error.
    async fn create(&self, body: &Value) -> Result<CreateOutcome>;

    /// The `mappings` object of the existing index (with `properties`).
    async fn mapping(&self) -> Result<Value>;

    /// Delete the index. Returns `false` if it did not exist.
    async fn delete(&self) -> Result<bool>;

    /// Store `source` under `id`, or under a backend-generated id when
    /// `id` is `None`. Returns the id used.
    async fn index_document(&self, id: Option<&str>, source: &Value) -> Result<String>;

    /// Fetch a document. A missing document is `Ok(None)`; a missing index
    /// is an error.
    async fn get_document(&self, id: &str) -> Result<Option<Hit>>;

    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> Result<UpdateOutcome>;

    async fn search(&self, query: &TermQuery) -> Result<Hits>;

    async fn refresh(&self) -> Result<()>;
}

/// Build the backend selected by `index.backend`.
pub fn connect(config: &IndexConfig) -> Result<Arc<dyn SearchIndex>> {
    match config.backend.as_str() {
        "elasticsearch" => Ok(Arc::new(ElasticIndex::new(config)?)),
        "memory" => Ok(Arc::new(MemoryIndex::new(&config.name))),
        other => bail!("Unknown index backend: {}", other),
    }
}
