//! ragpipe-text
//!
//! Tantivy-backed implementation of the `SearchService` collaborator, used
//! when `search.backend = "local"` and by the pipeline tests.
pub mod tantivy_utils;
pub mod index;

pub use index::TantivySearchService;
