use std::sync::Arc;
use tracing::{debug, info, warn};

use statrag_core::chunker::chunk_document;
use statrag_core::config::ChunkingConfig;
use statrag_core::error::{Error, Result};
use statrag_core::traits::EmbeddingProvider;
use statrag_core::types::{Chunk, Document, RebuildError, RebuildProgress, RebuildReport};
use statrag_hybrid::IndexSnapshot;
use statrag_vector::EmbeddingCache;

/// Decides which per-document steps are worth a progress callback: the first,
/// the last, and any step at least `step` points past the last one reported.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    step: u8,
    last: Option<u8>,
}

impl ProgressThrottle {
    pub fn new(step: u8) -> Self { Self { step: step.max(1), last: None } }

    /// Percentage to report after finishing document `index` (0-based) of `total`, if any.
    pub fn observe(&mut self, index: usize, total: usize) -> Option<u8> {
        if total == 0 { return None; }
        let pct = percentage(index + 1, total);
        let due = match self.last {
            None => true,
            Some(_) if index + 1 == total => true,
            Some(last) => pct.saturating_sub(last) >= self.step,
        };
        if due { self.last = Some(pct); }
        due.then_some(pct)
    }
}

fn percentage(done: usize, total: usize) -> u8 {
    (((done as f64) * 100.0 / total as f64).round()).min(100.0) as u8
}

/// Chunks and embeds one document, consulting the cache first.
pub(crate) async fn embed_document(doc: &Document, chunking: &ChunkingConfig, embedder: &dyn EmbeddingProvider, cache: &EmbeddingCache) -> (Vec<Chunk>, Result<Vec<Arc<[f32]>>>) {
    let chunks = chunk_document(&doc.doc_id, &doc.content, chunking);
    if chunks.is_empty() {
        let err = Error::Validation(format!("{}: content produced no chunks", doc.doc_id));
        return (chunks, Err(err));
    }
    let mut vectors = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        if let Some(v) = cache.get(embedder.embedder_id(), &chunk.text) {
            vectors.push(v);
            continue;
        }
        match embedder.embed(&chunk.text).await {
            Ok(v) => {
                let v: Arc<[f32]> = Arc::from(v);
                cache.put(embedder.embedder_id(), &chunk.text, v.clone());
                vectors.push(v);
            }
            Err(e) => return (chunks, Err(e)),
        }
    }
    (chunks, Ok(vectors))
}

/// Builds a fresh index generation from `docs`.
///
/// A document that fails to chunk or embed is recorded in the report and left
/// out of both indices; the run always completes. `on_progress` fires on the
/// calling task, throttled by `progress_step`.
pub async fn build_generation<F>(
    docs: &[Document],
    chunking: &ChunkingConfig,
    embedder: &dyn EmbeddingProvider,
    cache: &EmbeddingCache,
    progress_step: u8,
    mut on_progress: F,
) -> (IndexSnapshot, RebuildReport)
where
    F: FnMut(&RebuildProgress) + Send,
{
    let total = docs.len();
    let mut snapshot = IndexSnapshot::new(embedder.dim());
    let mut report = RebuildReport { total_docs: total, ..Default::default() };
    let mut throttle = ProgressThrottle::new(progress_step);

    for (i, doc) in docs.iter().enumerate() {
        let (chunks, vectors) = embed_document(doc, chunking, embedder, cache).await;
        let outcome = vectors.and_then(|v| snapshot.replace_document(&doc.doc_id, &chunks, Some(&v)));
        report.processed_docs += 1;
        match outcome {
            Ok(()) => {
                report.success_docs += 1;
                report.total_chunks += chunks.len();
                debug!(doc_id = %doc.doc_id, chunks = chunks.len(), "indexed");
            }
            Err(e) => {
                warn!(doc_id = %doc.doc_id, error = %e, "document failed to index");
                report.failed_docs += 1;
                report.errors.push(RebuildError { doc_id: doc.doc_id.clone(), error: e.to_string() });
            }
        }
        if let Some(percentage) = throttle.observe(i, total) {
            on_progress(&RebuildProgress { percentage, current: i + 1, total, current_doc_title: doc.title.clone() });
        }
    }
    if total == 0 {
        on_progress(&RebuildProgress { percentage: 100, current: 0, total: 0, current_doc_title: String::new() });
    }
    info!(total = report.total_docs, ok = report.success_docs, failed = report.failed_docs, chunks = report.total_chunks, "index generation built");
    (snapshot, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fired(total: usize, step: u8) -> Vec<u8> {
        let mut t = ProgressThrottle::new(step);
        (0..total).filter_map(|i| t.observe(i, total)).collect()
    }

    #[test]
    fn throttle_reports_first_last_and_every_step() {
        assert_eq!(fired(100, 5), vec![1, 6, 11, 16, 21, 26, 31, 36, 41, 46, 51, 56, 61, 66, 71, 76, 81, 86, 91, 96, 100]);
        assert_eq!(fired(3, 5), vec![33, 67, 100]);
        assert_eq!(fired(1, 5), vec![100]);
        assert!(fired(0, 5).is_empty());
    }

    #[test]
    fn throttle_bounds_callbacks_on_large_corpora() {
        let calls = fired(10_000, 5);
        assert!(calls.len() <= 22, "{} callbacks", calls.len());
        assert_eq!(calls.first(), Some(&0));
        assert_eq!(calls.last(), Some(&100));
    }
}
