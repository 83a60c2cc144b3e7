use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::Result;

/// Turns text into fixed-length vectors.
///
/// Implementations own their timeouts; a timeout surfaces as
/// `Error::Provider` like any other backend failure.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider kind, e.g. `ollama`.
    fn name(&self) -> &str;
    /// Stable identifier for the provider/model pair (e.g. `hashed:stats-mini:d384`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality when known up front.
    fn dim(&self) -> Option<usize>;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// One retrieved passage handed to the inference provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextChunk {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub query: String,
    /// Grounded prompt with the context already inlined.
    pub prompt: String,
    pub context: Vec<ContextChunk>,
}

/// Turns a grounded prompt into an answer.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Streams the answer in fragments. Providers without native streaming
    /// yield the complete answer as a single fragment.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<BoxStream<'static, Result<String>>> {
        let answer = self.complete(request).await?;
        Ok(stream::once(async move { Ok(answer) }).boxed())
    }
}
