use std::collections::HashMap;
use std::io::Read;

use anyhow::{anyhow, bail, Result};
use reqwest::blocking::{Body, Client};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tracing::{debug, info};

use ragpipe_core::config::{BlobConfig, HttpConfig};
use ragpipe_core::traits::BlobStore;

use crate::http::{build_client, ensure_success, transport};

const STORAGE_API_VERSION: &str = "2021-08-06";

/// The subset of a storage connection string needed for SAS uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub blob_endpoint: String,
    pub sas: String,
}

impl ConnectionString {
    /// Accepts either `BlobEndpoint=...` or `AccountName=...` (with optional
    /// `DefaultEndpointsProtocol` and `EndpointSuffix`), plus
    /// `SharedAccessSignature=...`. Values may themselves contain `=`.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: HashMap<&str, &str> = raw
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .filter_map(|p| p.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let blob_endpoint = match (parts.get("BlobEndpoint"), parts.get("AccountName")) {
            (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
            (None, Some(account)) => {
                let protocol = parts.get("DefaultEndpointsProtocol").copied().unwrap_or("https");
                let suffix = parts.get("EndpointSuffix").copied().unwrap_or("core.windows.net");
                format!("{protocol}://{account}.blob.{suffix}")
            }
            (None, None) => bail!("connection string has neither BlobEndpoint nor AccountName"),
        };
        let sas = match parts.get("SharedAccessSignature") {
            Some(sas) => sas.trim_start_matches('?').to_string(),
            None if parts.contains_key("AccountKey") => {
                bail!("account-key connection strings are not supported; use one with SharedAccessSignature")
            }
            None => bail!("connection string has no SharedAccessSignature"),
        };
        Ok(Self { blob_endpoint, sas })
    }

    pub fn blob_url(&self, container: &str, name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.blob_endpoint)?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("blob endpoint '{}' cannot be a base URL", self.blob_endpoint))?
            .pop_if_empty()
            .push(container)
            .extend(name.split('/'));
        url.set_query(Some(&self.sas));
        Ok(url)
    }
}

pub struct AzureBlobStore {
    client: Client,
    connection: ConnectionString,
    container: String,
}

impl AzureBlobStore {
    pub fn new(blob: &BlobConfig, http: &HttpConfig) -> Result<Self> {
        let raw = blob.connection_string.as_deref().ok_or_else(|| anyhow!("blob.connection_string is not set"))?;
        Ok(Self { client: build_client(http)?, connection: ConnectionString::parse(raw)?, container: blob.container.clone() })
    }
}

fn content_type_for(name: &str) -> &'static str {
    if name.to_ascii_lowercase().ends_with(".pdf") { "application/pdf" } else { "application/octet-stream" }
}

impl BlobStore for AzureBlobStore {
    fn put(&self, name: &str, data: Box<dyn Read + Send>, len: u64) -> Result<()> {
        if name.is_empty() {
            bail!("blob name must not be empty");
        }
        let url = self.connection.blob_url(&self.container, name)?;
        debug!(blob = name, container = %self.container, bytes = len, "uploading blob");
        let resp = self
            .client
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", STORAGE_API_VERSION)
            .header(CONTENT_TYPE, content_type_for(name))
            .body(Body::sized(data, len))
            .send()
            .map_err(|e| transport("blob upload", e))?;
        ensure_success("blob upload", resp)?;
        info!(blob = name, container = %self.container, bytes = len, "uploaded blob");
        Ok(())
    }
}
