use std::collections::HashMap;
use std::sync::Arc;

use statrag_core::error::{Error, Result};
use statrag_core::types::{ChunkId, SearchHit, SourceKind};

#[derive(Clone, Debug)]
struct Entry {
    seq: u64,
    doc_id: String,
    vector: Arc<[f32]>,
    norm: f32,
}

/// Brute-force cosine-similarity index over per-chunk embeddings.
///
/// The dimensionality is fixed either at construction or by the first
/// insert. Vectors are shared (`Arc<[f32]>`) so cloning a generation is cheap.
#[derive(Clone, Debug, Default)]
pub struct VectorIndex {
    dim: Option<usize>,
    entries: HashMap<ChunkId, Entry>,
    by_doc: HashMap<String, Vec<ChunkId>>,
    next_seq: u64,
}

impl VectorIndex {
    pub fn new(dim: Option<usize>) -> Self { Self { dim, ..Default::default() } }

    pub fn dim(&self) -> Option<usize> { self.dim }

    /// Stores or replaces the vector for `chunk_id`. A dimensionality mismatch
    /// rejects this insert and leaves the index untouched.
    pub fn index(&mut self, chunk_id: &str, doc_id: &str, embedding: impl Into<Arc<[f32]>>) -> Result<()> {
        let vector: Arc<[f32]> = embedding.into();
        if vector.is_empty() { return Err(Error::DimensionMismatch { expected: self.dim.unwrap_or(0), got: 0 }); }
        match self.dim {
            Some(expected) if expected != vector.len() => return Err(Error::DimensionMismatch { expected, got: vector.len() }),
            Some(_) => {}
            None => self.dim = Some(vector.len()),
        }
        self.remove(chunk_id);
        let norm = l2_norm(&vector);
        self.by_doc.entry(doc_id.to_string()).or_default().push(chunk_id.to_string());
        self.entries.insert(chunk_id.to_string(), Entry { seq: self.next_seq, doc_id: doc_id.to_string(), vector, norm });
        self.next_seq += 1;
        Ok(())
    }

    pub fn remove(&mut self, chunk_id: &str) -> bool {
        let Some(entry) = self.entries.remove(chunk_id) else { return false };
        if let Some(ids) = self.by_doc.get_mut(&entry.doc_id) {
            ids.retain(|id| id != chunk_id);
            if ids.is_empty() { self.by_doc.remove(&entry.doc_id); }
        }
        true
    }

    pub fn remove_document(&mut self, doc_id: &str) -> usize {
        let ids = self.by_doc.remove(doc_id).unwrap_or_default();
        ids.iter().filter(|id| self.entries.remove(id.as_str()).is_some()).count()
    }

    /// Cosine similarity against every stored vector; top `top_k` by
    /// descending similarity, ties in insertion order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        if let Some(expected) = self.dim {
            if expected != query.len() { return Err(Error::DimensionMismatch { expected, got: query.len() }); }
        }
        if top_k == 0 || self.entries.is_empty() { return Ok(Vec::new()); }
        let q_norm = l2_norm(query);
        let mut ranked: Vec<(&str, f32, u64)> = self
            .entries
            .iter()
            .map(|(id, e)| (id.as_str(), cosine(query, q_norm, &e.vector, e.norm), e.seq))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked.truncate(top_k);
        Ok(ranked.into_iter().map(|(id, score, _)| SearchHit { id: id.to_string(), score, source: SourceKind::Vector }).collect())
    }

    pub fn contains(&self, chunk_id: &str) -> bool { self.entries.contains_key(chunk_id) }

    pub fn has_document(&self, doc_id: &str) -> bool { self.by_doc.contains_key(doc_id) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

fn l2_norm(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 { return 0.0; }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (a_norm * b_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_vector_ranks_first() {
        let mut idx = VectorIndex::new(Some(3));
        idx.index("a:0", "a", vec![1.0, 0.0, 0.0]).unwrap();
        idx.index("b:0", "b", vec![0.0, 1.0, 0.0]).unwrap();
        idx.index("c:0", "c", vec![0.7, 0.7, 0.0]).unwrap();
        let hits = idx.search(&[0.1, 0.9, 0.0], 3).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b:0", "c:0", "a:0"]);
        assert!(hits[0].score > 0.99);
    }

    #[test]
    fn dimension_mismatch_is_isolated() {
        let mut idx = VectorIndex::new(None);
        idx.index("a:0", "a", vec![1.0, 0.0]).unwrap();
        assert_eq!(idx.dim(), Some(2));
        let err = idx.index("b:0", "b", vec![1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, got: 3 }));
        assert_eq!(idx.len(), 1);
        assert!(idx.search(&[1.0, 0.0], 5).is_ok());
        assert!(matches!(idx.search(&[1.0], 5), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn ties_follow_insertion_order_and_zero_vectors_score_zero() {
        let mut idx = VectorIndex::new(Some(2));
        idx.index("y:0", "y", vec![2.0, 0.0]).unwrap();
        idx.index("x:0", "x", vec![1.0, 0.0]).unwrap();
        idx.index("z:0", "z", vec![0.0, 0.0]).unwrap();
        let ids: Vec<_> = idx.search(&[3.0, 0.0], 3).unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["y:0", "x:0", "z:0"]);
    }

    #[test]
    fn remove_document_drops_every_vector() {
        let mut idx = VectorIndex::new(Some(2));
        idx.index("a:0", "a", vec![1.0, 0.0]).unwrap();
        idx.index("a:1", "a", vec![0.0, 1.0]).unwrap();
        idx.index("b:0", "b", vec![1.0, 1.0]).unwrap();
        assert_eq!(idx.remove_document("a"), 2);
        assert!(!idx.has_document("a"));
        let ids: Vec<_> = idx.search(&[1.0, 0.0], 5).unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["b:0"]);
    }
}
