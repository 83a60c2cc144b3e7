use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use statrag_core::error::{Error, Result};
use statrag_core::traits::EmbeddingProvider;

/// Deterministic offline embedder based on feature hashing.
///
/// Each lower-cased alphanumeric token is hashed into one of `dim` buckets and
/// the result is L2-normalised, so texts sharing vocabulary land close to each
/// other. Inputs longer than `max_input_chars` are rejected the way a model
/// host rejects inputs beyond its context window.
pub struct HashedEmbedder {
    dim: usize,
    max_input_chars: usize,
    id: String,
}

impl HashedEmbedder {
    pub fn new(model: &str, dim: usize, max_input_chars: usize) -> Result<Self> {
        if dim == 0 { return Err(Error::InvalidConfig(format!("hashed embedder '{model}' needs a dimension > 0"))); }
        Ok(Self { dim, max_input_chars, id: format!("hashed:{model}:d{dim}") })
    }

    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>> {
        let n_chars = text.chars().count();
        if n_chars > self.max_input_chars {
            return Err(Error::provider("hashed", format!("input of {n_chars} chars exceeds the {} char limit", self.max_input_chars)));
        }
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        Ok(v)
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbedder {
    fn name(&self) -> &str { "hashed" }
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> Option<usize> { Some(self.dim) }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> { self.embed_sync(text) }
}
