use std::sync::Arc;

use tracing::debug;

use ragpipe_core::traits::SearchService;
use ragpipe_core::{Error, Result};

/// Lexical top-k retrieval. Ranking belongs to the search service; this
/// only caps the count and joins contents with newlines.
pub struct Retriever {
    service: Arc<dyn SearchService>,
    index_name: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(service: Arc<dyn SearchService>, index_name: &str, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be at least 1".into()));
        }
        Ok(Self { service, index_name: index_name.to_string(), top_k })
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn retrieve(&self, query: &str) -> Result<String> {
        Ok(self.retrieve_chunks(query)?.join("\n"))
    }

    /// Contents of at most `top_k` matches in service rank order.
    pub fn retrieve_chunks(&self, query: &str) -> Result<Vec<String>> {
        let mut hits = self
            .service
            .search(&self.index_name, query, self.top_k)
            .map_err(|e| Error::Retrieval(format!("{e:#}")))?;
        hits.truncate(self.top_k);
        debug!(index = %self.index_name, hits = hits.len(), "retrieved context");
        Ok(hits.into_iter().map(|h| h.content).collect())
    }
}
