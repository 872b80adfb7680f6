//! Domain types shared by the chunker, the search backends and the answer
//! pipeline.

use serde::{Deserialize, Serialize};

pub type DocumentId = String;

/// A fixed-width window of one page's extracted text.
///
/// `sequence_index` is the ordinal of the chunk within a single ingest run,
/// counting across pages in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub sequence_index: usize,
    pub page: usize,
    pub text: String,
}

/// The searchable record stored by a search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: DocumentId,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub key: bool,
    pub searchable: bool,
}

impl FieldDef {
    pub fn key(name: &str) -> Self {
        Self { name: name.to_string(), kind: FieldKind::String, key: true, searchable: false }
    }

    pub fn searchable(name: &str) -> Self {
        Self { name: name.to_string(), kind: FieldKind::String, key: false, searchable: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl IndexSchema {
    /// The two-field chunk schema: `id` key plus searchable `content`.
    pub fn chunks(name: &str) -> Self {
        Self { name: name.to_string(), fields: vec![FieldDef::key("id"), FieldDef::searchable("content")] }
    }

    pub fn key_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.key)
    }
}

/// Per-document outcome of a write (upsert or delete) against a search service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingResult {
    pub key: DocumentId,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

impl IndexingResult {
    pub fn ok(key: &str) -> Self {
        Self { key: key.to_string(), succeeded: true, error_message: None }
    }

    pub fn failed(key: &str, message: impl Into<String>) -> Self {
        Self { key: key.to_string(), succeeded: false, error_message: Some(message.into()) }
    }
}

/// A ranked match. Higher `score` is better; ranking is owned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: DocumentId,
    pub content: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: Some(content.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}

/// Completion envelope. An empty `choices` list is a valid value here and
/// is rejected by the answer composer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}
