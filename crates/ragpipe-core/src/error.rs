use std::fmt;

use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Read,
    Upload,
    Index,
    Retrieve,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "configuration",
            Stage::Read => "document read",
            Stage::Upload => "upload",
            Stage::Index => "indexing",
            Stage::Retrieve => "retrieval",
            Stage::Complete => "completion",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read document: {0}")]
    DocumentRead(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Index operation failed after {succeeded} document(s) were written: {message}")]
    IndexOperation { message: String, succeeded: usize },

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Completion failed: {0}")]
    Completion(String),
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Error::InvalidConfig(_) => Stage::Config,
            Error::DocumentRead(_) => Stage::Read,
            Error::Upload(_) => Stage::Upload,
            Error::IndexOperation { .. } => Stage::Index,
            Error::Retrieval(_) => Stage::Retrieve,
            Error::Completion(_) => Stage::Complete,
        }
    }

    /// Schema or transport failure where nothing was written.
    pub fn index(err: impl fmt::Display) -> Self {
        Error::IndexOperation { message: err.to_string(), succeeded: 0 }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
