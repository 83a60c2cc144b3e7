//! statrag-vector
//!
//! Vector ("vector" mode) retrieval: a brute-force cosine index over chunk
//! embeddings and a content-addressed embedding cache.

pub mod cache;
pub mod index;

pub use cache::EmbeddingCache;
pub use index::VectorIndex;
