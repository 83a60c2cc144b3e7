use tracing::warn;

use statrag_core::config::SearchConfig;
use statrag_core::error::{Error, Result};
use statrag_core::types::{SearchHit, SearchMode, SourceKind};

use crate::rrf::reciprocal_rank_fusion;
use crate::snapshot::IndexSnapshot;

/// A ranked chunk resolved against the snapshot it was retrieved from.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub text: String,
    pub score: f32,
    pub source: SourceKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub chunks: Vec<RankedChunk>,
    /// Hybrid mode fell back to keyword-only ranking.
    pub degraded: bool,
    /// Candidates considered before truncation to `top_k`.
    pub candidates: usize,
    pub generation: u64,
}

impl IndexSnapshot {
    /// Runs `mode` against this generation.
    ///
    /// `query_embedding` is the outcome of embedding the query text; `None`
    /// means it was not attempted (keyword mode). Vector mode fails on a
    /// missing or failed embedding; hybrid mode degrades to keyword-only.
    pub fn retrieve(&self, query: &str, query_embedding: Option<Result<Vec<f32>>>, mode: SearchMode, top_k: usize, cfg: &SearchConfig) -> Result<Retrieval> {
        let (hits, degraded, candidates) = match mode {
            SearchMode::Fts5 => {
                let hits = self.keyword.search(query, top_k);
                let n = hits.len();
                (hits, false, n)
            }
            SearchMode::Vector => {
                let embedding = query_embedding.ok_or_else(|| Error::provider("embedding", "vector search needs a query embedding"))??;
                let hits = self.vector.search(&embedding, top_k)?;
                let n = hits.len();
                (hits, false, n)
            }
            SearchMode::Hybrid => {
                let wide = cfg.candidate_k(top_k);
                let keyword = self.keyword.search(query, wide);
                let (vector, degraded) = match query_embedding {
                    Some(Ok(embedding)) => match self.vector.search(&embedding, wide) {
                        Ok(hits) => (hits, false),
                        Err(e) => {
                            warn!(error = %e, "vector search failed; ranking by keyword only");
                            (Vec::new(), true)
                        }
                    },
                    Some(Err(e)) => {
                        warn!(error = %e, "query embedding failed; ranking by keyword only");
                        (Vec::new(), true)
                    }
                    None => (Vec::new(), true),
                };
                let fused = reciprocal_rank_fusion(&keyword, &vector, cfg.rrf_k, |id| self.seq(id));
                let n = fused.len();
                let hits: Vec<SearchHit> = fused.into_iter().take(top_k).map(|f| f.into_hit()).collect();
                (hits, degraded, n)
            }
        };
        let chunks = hits
            .into_iter()
            .filter_map(|h| {
                self.chunk(&h.id).map(|c| RankedChunk { chunk_id: h.id, doc_id: c.doc_id.clone(), text: c.text.clone(), score: h.score, source: h.source })
            })
            .collect();
        Ok(Retrieval { chunks, degraded, candidates, generation: self.generation() })
    }
}
