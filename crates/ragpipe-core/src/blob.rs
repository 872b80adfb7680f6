//! Local filesystem blob store, used when `blob.backend = "local"`.
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use tracing::info;

use crate::config::{expand_path, BlobConfig};
use crate::traits::BlobStore;

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(config: &BlobConfig) -> Self {
        Self { root: expand_path(&config.local_dir).join(&config.container) }
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, name: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(name);
        if name.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            bail!("invalid blob name '{}'", name);
        }
        Ok(self.root.join(rel))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, name: &str, mut data: Box<dyn Read + Send>, len: u64) -> anyhow::Result<()> {
        let target = self.path_for(name)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&target).with_context(|| format!("creating {}", target.display()))?;
        let written = io::copy(&mut data, &mut file).with_context(|| format!("writing {}", target.display()))?;
        if written != len {
            bail!("short write for '{}': expected {} bytes, wrote {}", name, len, written);
        }
        info!(blob = name, bytes = written, path = %target.display(), "stored blob");
        Ok(())
    }
}
