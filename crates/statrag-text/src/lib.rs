//! statrag-text
//!
//! Keyword ("fts5") retrieval: a tantivy text analyzer feeding an in-memory
//! BM25 inverted index over chunks.

pub mod analyzer;
pub mod index;

pub use index::KeywordIndex;
