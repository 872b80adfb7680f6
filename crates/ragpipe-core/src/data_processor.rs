//! PDF page extraction and fixed-window chunking.
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, info};

use crate::config::ChunkingConfig;
use crate::traits::PageSource;
use crate::types::Chunk;
use crate::{Error, Result};

/// Page text extraction backed by `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfPageSource;

impl PageSource for PdfPageSource {
    fn pages(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = fs::read(path).map_err(|e| Error::DocumentRead(format!("{}: {}", path.display(), e)))?;
        // pdf-extract panics on some malformed content streams.
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(&bytes)))
            .map_err(|_| Error::DocumentRead(format!("{}: text extraction aborted on malformed page", path.display())))?;
        extracted.map_err(|e| Error::DocumentRead(format!("{}: {}", path.display(), e)))
    }
}

pub struct DataProcessor {
    chunking_config: ChunkingConfig,
    source: Box<dyn PageSource>,
}

impl DataProcessor {
    pub fn new(chunking_config: &ChunkingConfig) -> Self {
        Self::with_source(chunking_config, Box::new(PdfPageSource))
    }

    pub fn with_source(chunking_config: &ChunkingConfig, source: Box<dyn PageSource>) -> Self {
        Self { chunking_config: chunking_config.clone(), source }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunking_config.chunk_size
    }

    /// Extract every page of `path` and split it into chunks. A page that
    /// fails to extract fails the whole document.
    pub fn process_file(&self, path: &Path) -> Result<Vec<Chunk>> {
        if !path.is_file() {
            return Err(Error::DocumentRead(format!("{}: no such file", path.display())));
        }
        let pages = self.source.pages(path)?;
        let chunks = split_pages(&pages, self.chunking_config.chunk_size)?;
        info!(path = %path.display(), pages = pages.len(), chunks = chunks.len(), "split document");
        Ok(chunks)
    }
}

/// Split each page into non-overlapping windows of `chunk_size` characters,
/// numbering chunks across pages in order. Empty pages produce no chunks.
pub fn split_pages<S: AsRef<str>>(pages: &[S], chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(Error::InvalidConfig("chunk size must be positive".into()));
    }
    let mut chunks = Vec::new();
    for (page, text) in pages.iter().enumerate() {
        let windows = split_text(text.as_ref(), chunk_size);
        debug!(page, windows = windows.len(), "split page");
        for window in windows {
            chunks.push(Chunk { sequence_index: chunks.len(), page, text: window.to_string() });
        }
    }
    Ok(chunks)
}

/// Windows are measured in characters, never splitting a UTF-8 sequence.
/// The last window may be shorter. `chunk_size` must be positive.
pub fn split_text(text: &str, chunk_size: usize) -> Vec<&str> {
    let mut windows = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == chunk_size {
            windows.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        windows.push(&text[start..]);
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_never_split_multibyte_chars() {
        let text = "héllo wörld";
        let windows = split_text(text, 3);
        assert_eq!(windows, vec!["hél", "lo ", "wör", "ld"]);
        assert!(windows.iter().all(|w| w.chars().count() <= 3));
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_window() {
        assert_eq!(split_text("ABCDEFGH", 4), vec!["ABCD", "EFGH"]);
    }
}
