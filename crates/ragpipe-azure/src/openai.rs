use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::debug;

use ragpipe_core::config::{CompletionConfig, HttpConfig};
use ragpipe_core::traits::CompletionService;
use ragpipe_core::types::{ChatCompletion, ChatMessage};

use crate::http::{build_client, ensure_success, transport};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
    n: u32,
}

/// Chat completions against an Azure OpenAI deployment.
pub struct AzureOpenAiCompletion {
    client: Client,
    url: String,
    key: String,
}

impl AzureOpenAiCompletion {
    pub fn new(completion: &CompletionConfig, http: &HttpConfig) -> Result<Self> {
        let endpoint = completion.endpoint.as_deref().ok_or_else(|| anyhow!("completion.endpoint is not set"))?;
        let deployment = completion.deployment.as_deref().ok_or_else(|| anyhow!("completion.deployment is not set"))?;
        let key = completion.key.clone().ok_or_else(|| anyhow!("completion.key is not set"))?;
        Ok(Self { client: build_client(http)?, url: chat_url(endpoint, deployment, &completion.api_version), key })
    }
}

fn chat_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
    )
}

fn decode(body: &str) -> Result<ChatCompletion> {
    serde_json::from_str(body).map_err(|e| anyhow!("malformed completion response: {}", e))
}

impl CompletionService for AzureOpenAiCompletion {
    fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion> {
        debug!(messages = messages.len(), "requesting chat completion");
        let resp = self
            .client
            .post(&self.url)
            .header("api-key", &self.key)
            .json(&ChatRequest { messages, n: 1 })
            .send()
            .map_err(|e| transport("chat completion", e))?;
        let body = ensure_success("chat completion", resp)?.text().map_err(|e| transport("chat completion body", e))?;
        decode(&body)
    }
}
