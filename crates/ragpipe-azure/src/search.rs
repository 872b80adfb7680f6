use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use ragpipe_core::config::{HttpConfig, IndexingConfig, SearchConfig};
use ragpipe_core::traits::SearchService;
use ragpipe_core::types::{IndexSchema, IndexingResult, SearchDocument, SearchHit};

use crate::http::{build_client, ensure_success, transport};

const KEY_FIELD: &str = "id";
const CONTENT_FIELD: &str = "content";

#[derive(Debug, Serialize)]
struct FieldDefinition<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    key: bool,
    searchable: bool,
    retrievable: bool,
}

#[derive(Debug, Serialize)]
struct IndexDefinition<'a> {
    name: &'a str,
    fields: Vec<FieldDefinition<'a>>,
}

impl<'a> From<&'a IndexSchema> for IndexDefinition<'a> {
    fn from(schema: &'a IndexSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|f| FieldDefinition { name: &f.name, kind: "Edm.String", key: f.key, searchable: f.searchable, retrievable: true })
            .collect();
        Self { name: &schema.name, fields }
    }
}

#[derive(Debug, Deserialize)]
struct IndexItemStatus {
    key: String,
    status: bool,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexBatchResponse {
    #[serde(default)]
    value: Vec<IndexItemStatus>,
}

#[derive(Debug, Deserialize)]
struct SearchResultItem {
    #[serde(rename = "@search.score", default)]
    score: f32,
    #[serde(default)]
    id: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchResultItem>,
}

fn upload_batch(docs: &[SearchDocument]) -> Value {
    let value: Vec<Value> = docs
        .iter()
        .map(|d| json!({ "@search.action": "upload", KEY_FIELD: d.id, CONTENT_FIELD: d.content }))
        .collect();
    json!({ "value": value })
}

fn delete_batch(ids: &[String]) -> Value {
    let value: Vec<Value> = ids.iter().map(|id| json!({ "@search.action": "delete", KEY_FIELD: id })).collect();
    json!({ "value": value })
}

fn search_body(query: &str, top_k: usize, select: &str) -> Value {
    json!({ "search": query, "top": top_k, "select": select, "queryType": "simple" })
}

/// Per-item statuses for a batch. Items the service did not report on are
/// treated as failed so they are never counted as written.
fn item_results(sent: &[String], resp: IndexBatchResponse) -> Vec<IndexingResult> {
    sent.iter()
        .map(|key| match resp.value.iter().find(|s| &s.key == key) {
            Some(s) if s.status => IndexingResult::ok(key),
            Some(s) => IndexingResult::failed(key, s.error_message.clone().unwrap_or_else(|| "rejected by search service".into())),
            None => IndexingResult::failed(key, "no status reported by search service"),
        })
        .collect()
}

/// Azure AI Search over its REST API, authenticated with an admin `api-key`.
pub struct AzureSearchService {
    client: Client,
    endpoint: String,
    key: String,
    api_version: String,
    batch_size: usize,
}

impl AzureSearchService {
    pub fn new(search: &SearchConfig, indexing: &IndexingConfig, http: &HttpConfig) -> Result<Self> {
        let service = search.service.as_deref().ok_or_else(|| anyhow!("search.service is not set"))?;
        let key = search.key.clone().ok_or_else(|| anyhow!("search.key is not set"))?;
        Ok(Self {
            client: build_client(http)?,
            endpoint: format!("https://{service}.search.windows.net"),
            key,
            api_version: search.api_version.clone(),
            batch_size: indexing.batch_size.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}?api-version={}", self.endpoint, path.trim_start_matches('/'), self.api_version)
    }

    fn post_index_batch(&self, index: &str, keys: &[String], body: &Value) -> Result<Vec<IndexingResult>> {
        let resp = self
            .client
            .post(self.url(&format!("indexes/{index}/docs/index")))
            .header("api-key", &self.key)
            .json(body)
            .send()
            .map_err(|e| transport("document batch", e))?;
        // 207 Multi-Status carries per-item failures in the same envelope as 200.
        let resp = if resp.status() == StatusCode::MULTI_STATUS { resp } else { ensure_success("document batch", resp)? };
        let parsed: IndexBatchResponse = resp.json().map_err(|e| transport("document batch response", e))?;
        Ok(item_results(keys, parsed))
    }

    fn run_search(&self, index: &str, body: &Value) -> Result<Vec<SearchResultItem>> {
        let resp = self
            .client
            .post(self.url(&format!("indexes/{index}/docs/search")))
            .header("api-key", &self.key)
            .json(body)
            .send()
            .map_err(|e| transport("search", e))?;
        let parsed: SearchResponse = ensure_success("search", resp)?.json().map_err(|e| transport("search response", e))?;
        Ok(parsed.value)
    }
}

impl SearchService for AzureSearchService {
    fn create_or_update_index(&self, schema: &IndexSchema) -> Result<()> {
        let definition = IndexDefinition::from(schema);
        let resp = self
            .client
            .put(self.url(&format!("indexes/{}", schema.name)))
            .header("api-key", &self.key)
            .header("Prefer", "return=minimal")
            .json(&definition)
            .send()
            .map_err(|e| transport("index create/update", e))?;
        ensure_success("index create/update", resp)?;
        info!(index = %schema.name, "index schema applied");
        Ok(())
    }

    /// Documents are sent in sub-requests of at most `indexing.batch_size`.
    /// Once a sub-request has landed, a later transport failure marks the
    /// remaining documents as failed instead of discarding what was written.
    fn upsert_documents(&self, index: &str, docs: &[SearchDocument]) -> Result<Vec<IndexingResult>> {
        let batches: Vec<&[SearchDocument]> = docs.chunks(self.batch_size).collect();
        let pb = if batches.len() > 1 { ProgressBar::new(docs.len() as u64) } else { ProgressBar::hidden() };
        pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));
        let mut results = Vec::with_capacity(docs.len());
        for batch in batches {
            let keys: Vec<String> = batch.iter().map(|d| d.id.clone()).collect();
            match self.post_index_batch(index, &keys, &upload_batch(batch)) {
                Ok(batch_results) => results.extend(batch_results),
                Err(e) if results.is_empty() => return Err(e),
                Err(e) => {
                    warn!(index, error = %e, "document batch failed after earlier batches were written");
                    let message = e.to_string();
                    results.extend(docs[results.len()..].iter().map(|d| IndexingResult::failed(&d.id, message.clone())));
                    break;
                }
            }
            pb.set_position(results.len() as u64);
        }
        pb.finish_and_clear();
        debug!(index, documents = docs.len(), "upsert finished");
        Ok(results)
    }

    fn search(&self, index: &str, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let items = self.run_search(index, &search_body(query, top_k, &format!("{KEY_FIELD},{CONTENT_FIELD}")))?;
        Ok(items.into_iter().map(|i| SearchHit { id: i.id, content: i.content, score: i.score }).collect())
    }

    fn delete_documents(&self, index: &str, ids: &[String]) -> Result<Vec<IndexingResult>> {
        let mut results = Vec::with_capacity(ids.len());
        for batch in ids.chunks(self.batch_size) {
            results.extend(self.post_index_batch(index, batch, &delete_batch(batch))?);
        }
        Ok(results)
    }

    fn list_ids(&self, index: &str, limit: usize) -> Result<Vec<String>> {
        let items = self.run_search(index, &search_body("*", limit, KEY_FIELD))?;
        Ok(items.into_iter().map(|i| i.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_definition_shape() {
        let schema = IndexSchema::chunks("pdf-chunks");
        let json = serde_json::to_value(IndexDefinition::from(&schema)).unwrap();
        assert_eq!(json["name"], "pdf-chunks");
        assert_eq!(json["fields"][0]["name"], "id");
        assert_eq!(json["fields"][0]["type"], "Edm.String");
        assert_eq!(json["fields"][0]["key"], true);
        assert_eq!(json["fields"][1]["name"], "content");
        assert_eq!(json["fields"][1]["searchable"], true);
        assert_eq!(json["fields"][1]["key"], false);
    }

    #[test]
    fn upload_batch_uses_upload_action() {
        let body = upload_batch(&[SearchDocument { id: "0".into(), content: "hello".into() }]);
        assert_eq!(body["value"][0]["@search.action"], "upload");
        assert_eq!(body["value"][0]["id"], "0");
        assert_eq!(body["value"][0]["content"], "hello");
    }

    #[test]
    fn multi_status_reports_partial_failure() {
        let resp: IndexBatchResponse = serde_json::from_str(
            r#"{"value":[
                {"key":"0","status":true,"errorMessage":null,"statusCode":201},
                {"key":"1","status":false,"errorMessage":"Document is too large","statusCode":400}
            ]}"#,
        )
        .unwrap();
        let sent = vec!["0".to_string(), "1".to_string(), "2".to_string()];
        let results = item_results(&sent, resp);
        assert!(results[0].succeeded);
        assert!(!results[1].succeeded);
        assert_eq!(results[1].error_message.as_deref(), Some("Document is too large"));
        assert!(!results[2].succeeded, "unreported items are not counted as written");
    }

    #[test]
    fn search_response_keeps_service_order() {
        let resp: SearchResponse = serde_json::from_str(
            r#"{"@odata.context":"x","value":[
                {"@search.score":0.4,"id":"7","content":"x"},
                {"@search.score":0.9,"id":"3","content":"y"}
            ]}"#,
        )
        .unwrap();
        let ids: Vec<&str> = resp.value.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "3"]);
    }

    #[test]
    fn search_body_caps_top() {
        let body = search_body("boiler", 5, "id,content");
        assert_eq!(body["top"], 5);
        assert_eq!(body["search"], "boiler");
    }
}
