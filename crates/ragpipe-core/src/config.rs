//! Typed configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `RAGPIPE_*` env vars (nested keys split on `__`, e.g.
//! `RAGPIPE_SEARCH__KEY`). The resulting [`Settings`] is built once at
//! startup and handed to components by reference.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub const ENV_PREFIX: &str = "RAGPIPE_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Local,
    Azure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Prefix chunk ids with a key derived from the blob name.
    pub namespace_ids: bool,
    /// Max documents per upsert request sent to a remote search service.
    pub batch_size: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self { namespace_ids: true, batch_size: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    pub backend: Backend,
    pub connection_string: Option<String>,
    pub container: String,
    pub local_dir: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            connection_string: None,
            container: "documents".to_string(),
            local_dir: "~/.ragpipe/blobs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub backend: Backend,
    /// Service name; the endpoint is `https://<service>.search.windows.net`.
    pub service: Option<String>,
    pub key: Option<String>,
    pub index_name: String,
    pub api_version: String,
    pub local_dir: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            service: None,
            key: None,
            index_name: "pdf-chunks".to_string(),
            api_version: "2023-11-01".to_string(),
            local_dir: "~/.ragpipe/indexes".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub endpoint: Option<String>,
    pub key: Option<String>,
    pub deployment: Option<String>,
    pub api_version: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self { endpoint: None, key: None, deployment: None, api_version: "2024-10-21".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 60, connect_timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub indexing: IndexingConfig,
    pub blob: BlobConfig,
    pub search: SearchConfig,
    pub completion: CompletionConfig,
    pub http: HttpConfig,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name, None)
    }

    /// Load for a named environment, optionally merging an explicit config
    /// file after the environment file. The explicit file must exist.
    pub fn load_for_env(env_name: &str, extra: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        if let Some(path) = extra {
            if !path.is_file() {
                return Err(Error::InvalidConfig(format!("config file not found: {}", path.display())));
            }
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let settings: Settings = figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be positive".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if self.indexing.batch_size == 0 {
            return Err(Error::InvalidConfig("indexing.batch_size must be positive".into()));
        }
        if self.blob.backend == Backend::Azure {
            require(&self.blob.connection_string, "blob.connection_string")?;
        }
        if self.search.backend == Backend::Azure {
            require(&self.search.service, "search.service")?;
            require(&self.search.key, "search.key")?;
        }
        Ok(())
    }

    /// Completion settings are only needed when a question is asked, so
    /// they are checked on demand rather than in [`Settings::validate`].
    pub fn require_completion(&self) -> Result<(&str, &str, &str)> {
        Ok((
            require(&self.completion.endpoint, "completion.endpoint")?,
            require(&self.completion.key, "completion.key")?,
            require(&self.completion.deployment, "completion.deployment")?,
        ))
    }
}

fn require<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::InvalidConfig(format!("{key} is required"))),
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
