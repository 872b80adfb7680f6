use std::io::Read;
use std::path::Path;

use crate::types::{ChatCompletion, ChatMessage, IndexSchema, IndexingResult, SearchDocument, SearchHit};

/// Object storage with overwrite-by-name semantics.
pub trait BlobStore: Send + Sync {
    fn put(&self, name: &str, data: Box<dyn Read + Send>, len: u64) -> anyhow::Result<()>;
}

pub trait SearchService: Send + Sync {
    fn create_or_update_index(&self, schema: &IndexSchema) -> anyhow::Result<()>;
    fn upsert_documents(&self, index: &str, docs: &[SearchDocument]) -> anyhow::Result<Vec<IndexingResult>>;
    fn search(&self, index: &str, query: &str, top_k: usize) -> anyhow::Result<Vec<SearchHit>>;
    fn delete_documents(&self, index: &str, ids: &[String]) -> anyhow::Result<Vec<IndexingResult>>;
    fn list_ids(&self, index: &str, limit: usize) -> anyhow::Result<Vec<String>>;
}

pub trait CompletionService: Send + Sync {
    fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatCompletion>;
}

/// Extracts the text of each page of a document, in page order.
pub trait PageSource: Send + Sync {
    fn pages(&self, path: &Path) -> crate::Result<Vec<String>>;
}
