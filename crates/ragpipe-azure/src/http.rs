use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::blocking::{Client, Response};

use ragpipe_core::config::HttpConfig;

pub(crate) fn build_client(config: &HttpConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()?)
}

/// Map a transport error to a readable message, calling out timeouts.
pub(crate) fn transport(what: &str, err: reqwest::Error) -> anyhow::Error {
    if err.is_timeout() {
        anyhow!("{} timed out: {}", what, err)
    } else if err.is_connect() {
        anyhow!("{} could not connect: {}", what, err)
    } else {
        anyhow!("{} failed: {}", what, err)
    }
}

/// Pass successful responses through; turn anything else into an error
/// carrying the status and (truncated) body.
pub(crate) fn ensure_success(what: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let mut body = resp.text().unwrap_or_default();
    if body.len() > 512 {
        let cut = (0..=512).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        body.truncate(cut);
        body.push('…');
    }
    Err(anyhow!("{} returned {}: {}", what, status, body))
}
