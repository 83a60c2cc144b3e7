use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use statrag_core::error::{Error, Result};
use statrag_core::traits::{CompletionRequest, EmbeddingProvider, InferenceProvider};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub(crate) fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Embeddings from an Ollama host (`POST /api/embed`).
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    id: String,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            id: format!("ollama:{model}"),
            client: http_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &str { "ollama" }
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> Option<usize> { None }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        debug!(model = %self.model, chars = text.len(), "ollama embed");
        let res = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| Error::provider("ollama", e))?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::provider("ollama", format!("embed {status}: {text}")));
        }
        let payload: EmbedResponse = res.json().await.map_err(|e| Error::provider("ollama", e))?;
        payload.embeddings.into_iter().next().ok_or_else(|| Error::provider("ollama", "empty embeddings"))
    }
}

/// Completions from an Ollama host (`POST /api/generate`), streamed as NDJSON on request.
pub struct OllamaInference {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaInference {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), model: model.to_string(), client: http_client(timeout_secs)? })
    }

    async fn generate(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "prompt": prompt, "stream": stream }))
            .send()
            .await
            .map_err(|e| Error::provider("ollama", e))?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::provider("ollama", format!("generate {status}: {text}")));
        }
        Ok(res)
    }
}

#[async_trait]
impl InferenceProvider for OllamaInference {
    fn name(&self) -> &str { "ollama" }
    fn model(&self) -> &str { &self.model }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let res = self.generate(&request.prompt, false).await?;
        let payload: GenerateResponse = res.json().await.map_err(|e| Error::provider("ollama", e))?;
        Ok(payload.response)
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<BoxStream<'static, Result<String>>> {
        let res = self.generate(&request.prompt, true).await?;
        debug!(model = %self.model, "streaming completion");
        Ok(ndjson_fragments(res.bytes_stream()))
    }
}

/// Turns an NDJSON byte stream into answer fragments. Lines are split on raw
/// bytes so a character cut across two network reads is decoded whole.
fn ndjson_fragments<S, B, E>(bytes: S) -> BoxStream<'static, Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let fragments = stream::unfold((Box::pin(bytes), Vec::<u8>::new(), false), |(mut bytes, mut buf, finished)| async move {
        if finished { return None; }
        loop {
            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                match parse_line(&line) {
                    None => continue,
                    Some(Ok((fragment, done))) => return Some((Ok(fragment), (bytes, buf, done))),
                    Some(Err(e)) => return Some((Err(e), (bytes, buf, true))),
                }
            }
            match bytes.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => return Some((Err(Error::provider("ollama", e)), (bytes, buf, true))),
                None => {
                    let rest = std::mem::take(&mut buf);
                    return parse_line(&rest).map(|r| (r.map(|(fragment, _)| fragment), (bytes, buf, true)));
                }
            }
        }
    });
    fragments.filter(|r| futures::future::ready(!matches!(r, Ok(f) if f.is_empty()))).boxed()
}

/// Parses one NDJSON line into `(fragment, done)`; blank lines yield `None`.
fn parse_line(line: &[u8]) -> Option<Result<(String, bool)>> {
    if line.iter().all(u8::is_ascii_whitespace) { return None; }
    Some(
        serde_json::from_slice::<GenerateResponse>(line)
            .map(|chunk| (chunk.response, chunk.done))
            .map_err(|e| Error::provider("ollama", format!("bad stream line: {e}"))),
    )
}
