use std::sync::Arc;

use tracing::info;

use ragpipe_core::traits::SearchService;
use ragpipe_core::types::IndexSchema;
use ragpipe_core::{Error, Result};

/// Converges the remote index onto the fixed chunk schema. Never touches
/// document data.
pub struct IndexManager {
    service: Arc<dyn SearchService>,
}

impl IndexManager {
    pub fn new(service: Arc<dyn SearchService>) -> Self {
        Self { service }
    }

    pub fn ensure_index(&self, name: &str) -> Result<IndexSchema> {
        let schema = IndexSchema::chunks(name);
        self.service.create_or_update_index(&schema).map_err(|e| Error::index(format!("{e:#}")))?;
        info!(index = name, "index ready");
        Ok(schema)
    }
}
