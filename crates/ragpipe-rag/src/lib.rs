//! ragpipe-rag
//!
//! The retrieval-augmented answer pipeline: schema convergence, chunk
//! indexing, top-k retrieval and prompt assembly, wired together by
//! [`Pipeline`].
pub mod answer;
pub mod index_manager;
pub mod indexer;
pub mod pipeline;
pub mod retriever;

pub use answer::{build_prompt, AnswerComposer};
pub use index_manager::IndexManager;
pub use indexer::{document_key, Indexer};
pub use pipeline::{Answer, IngestReport, Pipeline};
pub use retriever::Retriever;
