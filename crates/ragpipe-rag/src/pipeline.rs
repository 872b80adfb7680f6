use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use ragpipe_core::config::Settings;
use ragpipe_core::data_processor::DataProcessor;
use ragpipe_core::traits::{BlobStore, CompletionService, PageSource, SearchService};
use ragpipe_core::{Error, Result};

use crate::answer::AnswerComposer;
use crate::index_manager::IndexManager;
use crate::indexer::{document_key, Indexer};
use crate::retriever::Retriever;

const CLEAR_BATCH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub blob_name: String,
    pub chunks: usize,
    pub indexed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub context: String,
}

/// Upload → EnsureIndex → Chunk → Index for a document, and
/// Retrieve → Compose per question. Nothing is persisted locally between
/// steps; each stage fails fast with its own error kind.
pub struct Pipeline {
    index_name: String,
    namespace_ids: bool,
    top_k: usize,
    processor: DataProcessor,
    blob: Arc<dyn BlobStore>,
    search: Arc<dyn SearchService>,
    completion: Option<Arc<dyn CompletionService>>,
}

impl Pipeline {
    pub fn new(settings: &Settings, blob: Arc<dyn BlobStore>, search: Arc<dyn SearchService>) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            index_name: settings.search.index_name.clone(),
            namespace_ids: settings.indexing.namespace_ids,
            top_k: settings.retrieval.top_k,
            processor: DataProcessor::new(&settings.chunking),
            blob,
            search,
            completion: None,
        })
    }

    pub fn with_completion(mut self, completion: Arc<dyn CompletionService>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn with_page_source(mut self, source: Box<dyn PageSource>) -> Self {
        let chunking = ragpipe_core::config::ChunkingConfig { chunk_size: self.processor.chunk_size() };
        self.processor = DataProcessor::with_source(&chunking, source);
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn upload(&self, file_path: &Path, blob_name: &str) -> Result<()> {
        let file = File::open(file_path).map_err(|e| Error::DocumentRead(format!("{}: {}", file_path.display(), e)))?;
        let len = file.metadata().map_err(|e| Error::DocumentRead(format!("{}: {}", file_path.display(), e)))?.len();
        self.blob.put(blob_name, Box::new(file), len).map_err(|e| Error::Upload(format!("{e:#}")))?;
        info!(blob = blob_name, bytes = len, "Uploaded {} to blob storage.", blob_name);
        Ok(())
    }

    /// Batch, non-interactive half of the pipeline.
    pub fn ingest(&self, file_path: &Path, blob_name: &str) -> Result<IngestReport> {
        self.upload(file_path, blob_name)?;
        IndexManager::new(Arc::clone(&self.search)).ensure_index(&self.index_name)?;
        let chunks = self.processor.process_file(file_path)?;
        let namespace = self.namespace_ids.then(|| document_key(blob_name));
        let indexed = Indexer::new(Arc::clone(&self.search), &self.index_name).with_namespace(namespace).index_document(&chunks)?;
        Ok(IngestReport { blob_name: blob_name.to_string(), chunks: chunks.len(), indexed })
    }

    /// Answer one question against the current index contents.
    pub fn ask(&self, question: &str) -> Result<Answer> {
        self.ask_with_top_k(question, self.top_k)
    }

    pub fn ask_with_top_k(&self, question: &str, top_k: usize) -> Result<Answer> {
        let completion = self
            .completion
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("no completion service configured".into()))?;
        let context = Retriever::new(Arc::clone(&self.search), &self.index_name, top_k)?.retrieve(question)?;
        let text = AnswerComposer::new(Arc::clone(completion)).compose_answer(question, &context)?;
        Ok(Answer { text, context })
    }

    /// Delete every document from the index, listing up to 1000 ids per
    /// round. Ids already deleted are skipped and counted once. A round that
    /// lists nothing new means deletes have not become visible yet (remote
    /// search lags behind writes), so documents may remain and that is an
    /// error rather than a successful clear.
    pub fn clear(&self) -> Result<usize> {
        let mut deleted = 0;
        let mut attempted: HashSet<String> = HashSet::new();
        let mut rejected: Vec<String> = Vec::new();
        loop {
            let ids = self
                .search
                .list_ids(&self.index_name, CLEAR_BATCH)
                .map_err(|e| Error::IndexOperation { message: format!("{e:#}"), succeeded: deleted })?;
            if ids.is_empty() {
                break;
            }
            let listed = ids.len();
            let fresh: Vec<String> = ids.into_iter().filter(|id| !attempted.contains(id)).collect();
            if fresh.is_empty() {
                warn!(index = %self.index_name, listed, deleted, "listing returned only ids already deleted");
                return Err(Error::IndexOperation {
                    message: format!("{listed} documents are still listed after deletion; the index has not caught up, run clear again"),
                    succeeded: deleted,
                });
            }
            let results = self
                .search
                .delete_documents(&self.index_name, &fresh)
                .map_err(|e| Error::IndexOperation { message: format!("{e:#}"), succeeded: deleted })?;
            for r in &results {
                if r.succeeded {
                    deleted += 1;
                } else {
                    rejected.push(format!("{}: {}", r.key, r.error_message.as_deref().unwrap_or("unknown error")));
                }
            }
            info!(index = %self.index_name, batch = fresh.len(), deleted, "deleted batch");
            attempted.extend(fresh);
            if listed < CLEAR_BATCH {
                break;
            }
        }
        if !rejected.is_empty() {
            let mut message = format!("{} documents could not be deleted", rejected.len());
            message.push_str(&format!(" ({})", rejected.iter().take(3).cloned().collect::<Vec<_>>().join("; ")));
            return Err(Error::IndexOperation { message, succeeded: deleted });
        }
        info!(index = %self.index_name, deleted, "index cleared");
        Ok(deleted)
    }
}
