//! Embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! The cache is consulted before calling a provider and written through on
//! misses, so re-indexing a chunk whose text did not change costs nothing.
//! Switching models changes `embedder_id` and therefore misses naturally.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub fn hash_content(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

#[derive(Default)]
pub struct EmbeddingCache {
    entries: Mutex<HashMap<(String, String), Arc<[f32]>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, embedder_id: &str, text: &str) -> Option<Arc<[f32]>> {
        self.entries.lock().get(&(hash_content(text), embedder_id.to_string())).cloned()
    }

    pub fn put(&self, embedder_id: &str, text: &str, vector: Arc<[f32]>) {
        self.entries.lock().insert((hash_content(text), embedder_id.to_string()), vector);
    }

    pub fn clear(&self) { self.entries.lock().clear(); }

    pub fn len(&self) -> usize { self.entries.lock().len() }

    pub fn is_empty(&self) -> bool { self.entries.lock().is_empty() }
}
