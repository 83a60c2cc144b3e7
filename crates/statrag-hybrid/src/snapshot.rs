//! Immutable index generations.
//!
//! Writers clone the current `IndexSnapshot`, apply their changes to the copy
//! and publish it through `IndexHandle`. Readers hold an `Arc` to whichever
//! generation was current when they started, so a query never observes one
//! index updated and the other not.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use statrag_core::error::{Error, Result};
use statrag_core::types::{Chunk, ChunkId};
use statrag_text::KeywordIndex;
use statrag_vector::VectorIndex;

/// Chunk text and ownership as indexed in one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub chunk_id: ChunkId,
    pub doc_id: String,
    pub text: String,
    pub position: usize,
    pub seq: u64,
}

#[derive(Clone, Default)]
pub struct IndexSnapshot {
    pub(crate) keyword: KeywordIndex,
    pub(crate) vector: VectorIndex,
    chunks: HashMap<ChunkId, ChunkRecord>,
    by_doc: HashMap<String, Vec<ChunkId>>,
    next_seq: u64,
    generation: u64,
}

impl IndexSnapshot {
    pub fn new(dim: Option<usize>) -> Self { Self { vector: VectorIndex::new(dim), ..Default::default() } }

    pub fn generation(&self) -> u64 { self.generation }

    /// Replaces every chunk of `doc_id` with `chunks`.
    ///
    /// With `embeddings` the chunks go into both indices; without, only into
    /// the keyword index. Embeddings are checked up front so a bad vector
    /// leaves the document's previous entries in place.
    pub fn replace_document(&mut self, doc_id: &str, chunks: &[Chunk], embeddings: Option<&[Arc<[f32]>]>) -> Result<()> {
        if let Some(vectors) = embeddings {
            if vectors.len() != chunks.len() {
                return Err(Error::Validation(format!("{doc_id}: {} embeddings for {} chunks", vectors.len(), chunks.len())));
            }
            let mut expected = self.vector.dim();
            for v in vectors {
                let want = *expected.get_or_insert(v.len());
                if v.is_empty() || v.len() != want { return Err(Error::DimensionMismatch { expected: want, got: v.len() }); }
            }
        }
        self.remove_document(doc_id);
        for (i, chunk) in chunks.iter().enumerate() {
            self.keyword.index(&chunk.chunk_id, doc_id, &chunk.text);
            if let Some(vectors) = embeddings { self.vector.index(&chunk.chunk_id, doc_id, vectors[i].clone())?; }
            self.chunks.insert(
                chunk.chunk_id.clone(),
                ChunkRecord { chunk_id: chunk.chunk_id.clone(), doc_id: doc_id.to_string(), text: chunk.text.clone(), position: chunk.position, seq: self.next_seq },
            );
            self.by_doc.entry(doc_id.to_string()).or_default().push(chunk.chunk_id.clone());
            self.next_seq += 1;
        }
        Ok(())
    }

    /// Drops every chunk of `doc_id` from the chunk table and both indices.
    pub fn remove_document(&mut self, doc_id: &str) -> usize {
        self.keyword.remove_document(doc_id);
        self.vector.remove_document(doc_id);
        let ids = self.by_doc.remove(doc_id).unwrap_or_default();
        ids.iter().filter(|id| self.chunks.remove(id.as_str()).is_some()).count()
    }

    pub fn chunk(&self, chunk_id: &str) -> Option<&ChunkRecord> { self.chunks.get(chunk_id) }

    /// Position of `chunk_id` in insertion order; unknown ids sort last.
    pub fn seq(&self, chunk_id: &str) -> u64 { self.chunks.get(chunk_id).map_or(u64::MAX, |c| c.seq) }

    pub fn contains_document(&self, doc_id: &str) -> bool { self.by_doc.contains_key(doc_id) }

    /// Whether `doc_id` has vector entries in this generation.
    pub fn is_embedded(&self, doc_id: &str) -> bool { self.vector.has_document(doc_id) }

    pub fn chunk_count(&self) -> usize { self.chunks.len() }

    pub fn vector_count(&self) -> usize { self.vector.len() }

    pub fn keyword(&self) -> &KeywordIndex { &self.keyword }
}

/// The published generation. Swapping is a pointer store under a short write lock.
pub struct IndexHandle {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl Default for IndexHandle {
    fn default() -> Self { Self::new(IndexSnapshot::default()) }
}

impl IndexHandle {
    pub fn new(initial: IndexSnapshot) -> Self { Self { current: RwLock::new(Arc::new(initial)) } }

    pub fn load(&self) -> Arc<IndexSnapshot> { self.current.read().clone() }

    /// Publishes `next` as the following generation and returns its number.
    pub fn publish(&self, mut next: IndexSnapshot) -> u64 {
        let mut current = self.current.write();
        next.generation = current.generation + 1;
        let generation = next.generation;
        *current = Arc::new(next);
        generation
    }
}
