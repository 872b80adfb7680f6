use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::{info, warn};
use twox_hash::XxHash64;

use ragpipe_core::traits::SearchService;
use ragpipe_core::types::{Chunk, SearchDocument};
use ragpipe_core::{Error, Result};

/// Search-service keys allow only `[A-Za-z0-9_\-=]`, so everything else in
/// a blob name becomes `_`. That mapping is lossy (`a.pdf` and `a_pdf` look
/// the same), so a hash of the raw name is appended to keep keys distinct.
pub fn document_key(blob_name: &str) -> String {
    let readable: String = blob_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '=') { c } else { '_' })
        .collect();
    let mut hasher = XxHash64::with_seed(0);
    blob_name.hash(&mut hasher);
    format!("{}_{:016x}", readable, hasher.finish())
}

pub struct Indexer {
    service: Arc<dyn SearchService>,
    index_name: String,
    namespace: Option<String>,
}

impl Indexer {
    pub fn new(service: Arc<dyn SearchService>, index_name: &str) -> Self {
        Self { service, index_name: index_name.to_string(), namespace: None }
    }

    /// Prefix ids with `<namespace>-` so different documents sharing an
    /// index do not overwrite each other's chunks.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Ids are the chunk's position in `chunks` (0..N-1), optionally namespaced.
    pub fn documents(&self, chunks: &[Chunk]) -> Vec<SearchDocument> {
        chunks
            .iter()
            .enumerate()
            .map(|(i, c)| SearchDocument {
                id: match &self.namespace {
                    Some(ns) => format!("{ns}-{i}"),
                    None => i.to_string(),
                },
                content: c.text.clone(),
            })
            .collect()
    }

    /// Upsert every chunk in one batch. Any per-item failure is an error
    /// that reports how many documents were written.
    pub fn index_document(&self, chunks: &[Chunk]) -> Result<usize> {
        let documents = self.documents(chunks);
        if documents.is_empty() {
            info!(index = %self.index_name, "no chunks to index");
            return Ok(0);
        }
        let results = self
            .service
            .upsert_documents(&self.index_name, &documents)
            .map_err(|e| Error::index(format!("{e:#}")))?;

        let succeeded = results.iter().filter(|r| r.succeeded).count();
        let failures: Vec<String> = results
            .iter()
            .filter(|r| !r.succeeded)
            .map(|r| format!("{}: {}", r.key, r.error_message.as_deref().unwrap_or("unknown error")))
            .collect();
        if !failures.is_empty() || succeeded != documents.len() {
            warn!(index = %self.index_name, succeeded, total = documents.len(), "partial index write");
            let mut message = format!("{} of {} documents were not written", documents.len() - succeeded, documents.len());
            if !failures.is_empty() {
                message.push_str(&format!(" ({})", failures.iter().take(3).cloned().collect::<Vec<_>>().join("; ")));
            }
            return Err(Error::IndexOperation { message, succeeded });
        }
        info!(index = %self.index_name, count = succeeded, "Indexed {} chunks.", succeeded);
        Ok(succeeded)
    }
}
