use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use statrag_core::error::{Error, Result};
use statrag_core::traits::{CompletionRequest, EmbeddingProvider, InferenceProvider};

use crate::ollama::http_client;

/// LM Studio's default; any OpenAI-compatible host works.
pub const DEFAULT_BASE_URL: &str = "http://localhost:1234";

const SYSTEM_PROMPT: &str = "You answer questions about statistical methods using only the provided context. Cite document titles.";

/// Embeddings from an OpenAI-compatible host (`POST /v1/embeddings`).
pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    id: String,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            id: format!("openai:{model}"),
            client: http_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn name(&self) -> &str { "openai" }
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> Option<usize> { None }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let payload = post_json(&self.client, &url, json!({ "model": self.model, "input": [text] })).await?;
        let values = payload["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| Error::provider("openai", "response has no data[0].embedding"))?;
        values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32).ok_or_else(|| Error::provider("openai", "non-numeric embedding value")))
            .collect()
    }
}

/// Chat completions from an OpenAI-compatible host (`POST /v1/chat/completions`).
pub struct OpenAiInference {
    base_url: String,
    model: String,
    client: Client,
}

impl OpenAiInference {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), model: model.to_string(), client: http_client(timeout_secs)? })
    }
}

#[async_trait]
impl InferenceProvider for OpenAiInference {
    fn name(&self) -> &str { "openai" }
    fn model(&self) -> &str { &self.model }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": request.prompt },
            ],
            "stream": false,
        });
        let payload = post_json(&self.client, &url, body).await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::provider("openai", "response has no choices[0].message.content"))
    }
}

async fn post_json(client: &Client, url: &str, body: Value) -> Result<Value> {
    debug!(url, "openai-compatible request");
    let res = client.post(url).json(&body).send().await.map_err(|e| Error::provider("openai", e))?;
    if !res.status().is_success() {
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        return Err(Error::provider("openai", format!("{url} {status}: {text}")));
    }
    res.json().await.map_err(|e| Error::provider("openai", e))
}
