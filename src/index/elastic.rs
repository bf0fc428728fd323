//! Elasticsearch backend over the REST API.
//!
//! Uses typeless `_doc` endpoints (Elasticsearch 7 and later). Request and
//! response bodies are built and parsed by small free functions so they can
//! be tested without a running node.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::{json, Value};

use super::{
    BackendInfo, CreateOutcome, DocumentUpdate, Hit, Hits, SearchIndex, TermQuery, UpdateOutcome,
};
use crate::config::IndexConfig;

const INCREMENT_STOCK_SCRIPT: &str = "if (ctx._source.stock == null) { ctx._source.stock = params.num } else { ctx._source.stock += params.num }";

/// Client for one Elasticsearch index.
pub struct ElasticIndex {
    client: Client,
    base: Url,
    index: String,
    retry_on_conflict: u32,
    refresh_on_write: bool,
}

impl ElasticIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let base = Url::parse(&config.url)
            .with_context(|| format!("Invalid Elasticsearch URL: {}", config.url))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base,
            index: config.name.clone(),
            retry_on_conflict: config.retry_on_conflict,
            refresh_on_write: config.refresh_on_write,
        })
    }

    /// Base URL joined with percent-encoded path segments.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Elasticsearch URL cannot be a base: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn write_params(&self) -> Vec<(&'static str, String)> {
        if self.refresh_on_write {
            vec![("refresh", "wait_for".to_string())]
        } else {
            Vec::new()
        }
    }
}

/// Turn a non-success response into an error carrying status and body.
async fn failure(what: &str, response: Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow!("Elasticsearch {} failed with {}: {}", what, status, body)
}

fn error_type(body: &Value) -> Option<&str> {
    body.pointer("/error/type").and_then(Value::as_str)
}

#[async_trait]
impl SearchIndex for ElasticIndex {
    fn name(&self) -> &str {
        &self.index
    }

    async fn info(&self) -> Result<BackendInfo> {
        let response = self
            .client
            .get(self.base.clone())
            .send()
            .await
            .with_context(|| format!("Elasticsearch unreachable at {}", self.base))?;
        if !response.status().is_success() {
            return Err(failure("info", response).await);
        }
        let body: Value = response.json().await?;
        Ok(parse_info(&body))
    }

    async fn exists(&self) -> Result<bool> {
        let response = self
            .client
            .head(self.url(&[&self.index])?)
            .send()
            .await
            .with_context(|| format!("Elasticsearch unreachable at {}", self.base))?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(failure("index exists check", response).await),
        }
    }

    async fn create(&self, body: &Value) -> Result<CreateOutcome> {
        let response = self
            .client
            .put(self.url(&[&self.index])?)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let outcome = parse_create_response(status, &text)?;
        if outcome == CreateOutcome::Created
            && serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|ack| ack.get("acknowledged").and_then(Value::as_bool))
                == Some(false)
        {
            tracing::warn!(index = %self.index, "index creation not acknowledged");
        }
        Ok(outcome)
    }

    async fn mapping(&self) -> Result<Value> {
        let response = self
            .client
            .get(self.url(&[&self.index, "_mapping"])?)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(failure("get mapping", response).await);
        }
        let body: Value = response.json().await?;
        parse_mapping(&body)
    }

    async fn delete(&self) -> Result<bool> {
        let response = self
            .client
            .delete(self.url(&[&self.index])?)
            .send()
            .await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(failure("delete index", response).await),
        }
    }

    async fn index_document(&self, id: Option<&str>, source: &Value) -> Result<String> {
        let request = match id {
            Some(id) => self.client.put(self.url(&[&self.index, "_doc", id])?),
            None => self.client.post(self.url(&[&self.index, "_doc"])?),
        };
        let response = request
            .query(&self.write_params())
            .json(source)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(failure("index document", response).await);
        }
        let body: Value = response.json().await?;
        body.get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Elasticsearch index response missing _id: {}", body))
    }

    async fn get_document(&self, id: &str) -> Result<Option<Hit>> {
        let response = self
            .client
            .get(self.url(&[&self.index, "_doc", id])?)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(failure("get document", response).await);
        }
        let body: Value = response.json().await?;
        parse_get(&body)
    }

    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> Result<UpdateOutcome> {
        let mut params = self.write_params();
        params.push(("retry_on_conflict", self.retry_on_conflict.to_string()));

        let response = self
            .client
            .post(self.url(&[&self.index, "_update", id])?)
            .query(&params)
            .json(&update_body(update))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        parse_update_response(status, &text)
    }

    async fn search(&self, query: &TermQuery) -> Result<Hits> {
        let response = self
            .client
            .post(self.url(&[&self.index, "_search"])?)
            .json(&search_body(query))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(failure("search", response).await);
        }
        let body: Value = response.json().await?;
        parse_search(&body)
    }

    async fn refresh(&self) -> Result<()> {
        let response = self
            .client
            .post(self.url(&[&self.index, "_refresh"])?)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(failure("refresh", response).await);
        }
        Ok(())
    }
}

// ============ Request bodies ============

fn update_body(update: &DocumentUpdate) -> Value {
    match update {
        DocumentUpdate::IncrementStock { by, upsert } => {
            let mut body = json!({
                "script": {
                    "source": INCREMENT_STOCK_SCRIPT,
                    "lang": "painless",
                    "params": { "num": by }
                }
            });
            if let Some(doc) = upsert {
                body["upsert"] = doc.clone();
            }
            body
        }
        DocumentUpdate::Merge(fields) => json!({ "doc": fields }),
    }
}

fn search_body(query: &TermQuery) -> Value {
    let mut body = json!({
        "query": { "term": { query.field.as_str(): query.value } },
        "from": query.from,
        "size": query.size,
        "version": true
    });
    if let Some(ref field) = query.sort_by {
        let order = if query.ascending { "asc" } else { "desc" };
        body["sort"] = json!([{ field.as_str(): { "order": order } }]);
    }
    body
}

// ============ Response parsing ============

fn parse_info(body: &Value) -> BackendInfo {
    BackendInfo {
        backend: "elasticsearch".to_string(),
        version: body
            .pointer("/version/number")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
    }
}

/// `GET /{index}/_mapping` is keyed by the concrete index name, which may
/// differ from the requested one when an alias is used.
fn parse_mapping(body: &Value) -> Result<Value> {
    body.as_object()
        .and_then(|indices| indices.values().next())
        .and_then(|index| index.get("mappings"))
        .cloned()
        .ok_or_else(|| anyhow!("Elasticsearch mapping response has no mappings: {}", body))
}

/// An index that already exists is an outcome, not a failure.
fn parse_create_response(status: StatusCode, text: &str) -> Result<CreateOutcome> {
    if status.is_success() {
        return Ok(CreateOutcome::Created);
    }
    let body: Value = serde_json::from_str(text).unwrap_or(Value::Null);
    if error_type(&body) == Some("resource_already_exists_exception") {
        return Ok(CreateOutcome::AlreadyExists);
    }
    bail!("Elasticsearch create index failed with {}: {}", status, text)
}

/// A missing document is `NotFound`; a missing index stays an error.
fn parse_update_response(status: StatusCode, text: &str) -> Result<UpdateOutcome> {
    let body: Value = serde_json::from_str(text).unwrap_or(Value::Null);
    if status.is_success() {
        return Ok(UpdateOutcome::Updated {
            version: body.get("_version").and_then(Value::as_i64),
        });
    }
    if status == StatusCode::NOT_FOUND && error_type(&body) == Some("document_missing_exception") {
        return Ok(UpdateOutcome::NotFound);
    }
    bail!("Elasticsearch update document failed with {}: {}", status, text)
}

fn parse_get(body: &Value) -> Result<Option<Hit>> {
    match body.get("found").and_then(Value::as_bool) {
        Some(true) => parse_hit(body).map(Some),
        Some(false) => Ok(None),
        None => match error_type(body) {
            Some(kind) => bail!("Elasticsearch get document failed: {}", kind),
            None => bail!("Unexpected Elasticsearch get response: {}", body),
        },
    }
}

fn parse_hit(hit: &Value) -> Result<Hit> {
    let id = hit
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Elasticsearch hit missing _id"))?;
    Ok(Hit {
        id: id.to_string(),
        version: hit.get("_version").and_then(Value::as_i64),
        source: hit.get("_source").cloned().unwrap_or(Value::Null),
    })
}

/// Accepts both the 6.x (`"total": 3`) and 7.x+ (`"total": {"value": 3}`)
/// total formats.
fn parse_search(body: &Value) -> Result<Hits> {
    let hits = body
        .get("hits")
        .ok_or_else(|| anyhow!("Elasticsearch search response missing hits"))?;

    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(obj) => obj.get("value").and_then(Value::as_u64).unwrap_or(0),
        None => 0,
    };

    let hits = hits
        .get("hits")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(parse_hit).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();

    Ok(Hits { total, hits })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elastic(url: &str) -> ElasticIndex {
        ElasticIndex::new(&IndexConfig {
            url: url.to_string(),
            ..IndexConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_encodes_document_ids() {
        let index = elastic("http://127.0.0.1:9200/");
        let url = index.url(&["inventopedia", "_doc", "a/b c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9200/inventopedia/_doc/a%2Fb%20c"
        );
    }

    #[test]
    fn test_url_keeps_base_path() {
        let index = elastic("http://proxy.local/es");
        let url = index.url(&["inventopedia", "_search"]).unwrap();
        assert_eq!(url.as_str(), "http://proxy.local/es/inventopedia/_search");
    }

    #[test]
    fn test_increment_body_without_upsert() {
        let body = update_body(&DocumentUpdate::IncrementStock {
            by: 2,
            upsert: None,
        });
        assert_eq!(body["script"]["params"]["num"], json!(2));
        assert_eq!(body["script"]["lang"], json!("painless"));
        assert!(body.get("upsert").is_none());
    }

    #[test]
    fn test_increment_body_with_upsert() {
        let body = update_body(&DocumentUpdate::IncrementStock {
            by: 1,
            upsert: Some(json!({"name": "Chair", "description": "", "stock": 0})),
        });
        assert_eq!(body["upsert"]["stock"], json!(0));
    }

    #[test]
    fn test_merge_body() {
        let body = update_body(&DocumentUpdate::Merge(json!({"name": "Stool"})));
        assert_eq!(body, json!({"doc": {"name": "Stool"}}));
    }

    #[test]
    fn test_search_body_term_sort_window() {
        let body = search_body(&TermQuery::sorted("name", "chair", 20, 10));
        assert_eq!(body["query"], json!({"term": {"name": "chair"}}));
        assert_eq!(body["sort"], json!([{"name": {"order": "asc"}}]));
        assert_eq!(body["from"], json!(20));
        assert_eq!(body["size"], json!(10));
    }

    #[test]
    fn test_parse_search_both_total_formats() {
        let v7 = json!({"hits": {"total": {"value": 2, "relation": "eq"}, "hits": [
            {"_id": "a", "_version": 3, "_source": {"name": "chair", "description": ""}},
            {"_id": "b", "_source": {"name": "chair", "description": ""}}
        ]}});
        let hits = parse_search(&v7).unwrap();
        assert_eq!(hits.total, 2);
        assert_eq!(hits.hits[0].version, Some(3));
        assert_eq!(hits.hits[1].version, None);

        let v6 = json!({"hits": {"total": 5, "hits": []}});
        assert_eq!(parse_search(&v6).unwrap().total, 5);
    }

    #[test]
    fn test_parse_get_found_and_missing() {
        let found = json!({"_index": "inventopedia", "_id": "1", "_version": 2, "found": true,
            "_source": {"name": "Chair", "description": "green"}});
        let hit = parse_get(&found).unwrap().unwrap();
        assert_eq!(hit.id, "1");
        assert_eq!(hit.source["name"], json!("Chair"));

        let missing = json!({"_index": "inventopedia", "_id": "9", "found": false});
        assert!(parse_get(&missing).unwrap().is_none());
    }

    #[test]
    fn test_parse_get_missing_index_is_error() {
        let body = json!({"error": {"type": "index_not_found_exception"}, "status": 404});
        let err = parse_get(&body).unwrap_err().to_string();
        assert!(err.contains("index_not_found_exception"));
    }

    #[test]
    fn test_parse_create_response() {
        let ok = r#"{"acknowledged": true, "shards_acknowledged": true, "index": "inventopedia"}"#;
        assert_eq!(
            parse_create_response(StatusCode::OK, ok).unwrap(),
            CreateOutcome::Created
        );

        let exists = r#"{"error": {"type": "resource_already_exists_exception",
            "reason": "index [inventopedia/abc] already exists"}, "status": 400}"#;
        assert_eq!(
            parse_create_response(StatusCode::BAD_REQUEST, exists).unwrap(),
            CreateOutcome::AlreadyExists
        );

        let bad = r#"{"error": {"type": "mapper_parsing_exception"}, "status": 400}"#;
        let err = parse_create_response(StatusCode::BAD_REQUEST, bad).unwrap_err();
        assert!(err.to_string().contains("mapper_parsing_exception"));

        assert!(parse_create_response(StatusCode::BAD_GATEWAY, "not json").is_err());
    }

    #[test]
    fn test_parse_update_response() {
        let ok = r#"{"_index": "inventopedia", "_id": "1", "_version": 4, "result": "updated"}"#;
        assert_eq!(
            parse_update_response(StatusCode::OK, ok).unwrap(),
            UpdateOutcome::Updated { version: Some(4) }
        );

        let missing_doc = r#"{"error": {"type": "document_missing_exception",
            "reason": "[1]: document missing"}, "status": 404}"#;
        assert_eq!(
            parse_update_response(StatusCode::NOT_FOUND, missing_doc).unwrap(),
            UpdateOutcome::NotFound
        );

        let missing_index = r#"{"error": {"type": "index_not_found_exception"}, "status": 404}"#;
        let err = parse_update_response(StatusCode::NOT_FOUND, missing_index).unwrap_err();
        assert!(err.to_string().contains("index_not_found_exception"));

        let conflict = r#"{"error": {"type": "version_conflict_engine_exception"}, "status": 409}"#;
        assert!(parse_update_response(StatusCode::CONFLICT, conflict).is_err());
    }

    #[test]
    fn test_parse_mapping_uses_concrete_index() {
        let body = json!({"inventopedia-000001": {"mappings": {"properties": {"name": {"type": "keyword"}}}}});
        let mapping = parse_mapping(&body).unwrap();
        assert_eq!(mapping["properties"]["name"]["type"], json!("keyword"));
    }

    #[test]
    fn test_parse_info_version() {
        let body = json!({"name": "node-1", "version": {"number": "8.13.4"}});
        assert_eq!(parse_info(&body).version, "8.13.4");
        assert_eq!(parse_info(&json!({})).version, "unknown");
    }
}
