//! ragpipe-azure
//!
//! Blocking REST clients for the cloud collaborators: Azure Blob Storage,
//! Azure AI Search and Azure OpenAI chat completions.
mod http;

pub mod blob;
pub mod openai;
pub mod search;

pub use blob::{AzureBlobStore, ConnectionString};
pub use openai::AzureOpenAiCompletion;
pub use search::AzureSearchService;
