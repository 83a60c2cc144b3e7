use std::cmp::Ordering;
use std::collections::HashMap;

use statrag_core::types::{ChunkId, SearchHit, SourceKind};

pub const DEFAULT_RRF_K: f32 = 60.0;

/// One chunk after fusion, with its 1-based rank in each source list.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub id: ChunkId,
    pub score: f64,
    pub keyword_rank: Option<usize>,
    pub vector_rank: Option<usize>,
}

impl FusedHit {
    pub fn into_hit(self) -> SearchHit { SearchHit { id: self.id, score: self.score as f32, source: SourceKind::Fused } }
}

/// Reciprocal Rank Fusion of a keyword and a vector ranking.
///
/// Each chunk scores `Σ 1 / (k + rank)` over the lists it appears in. Ties
/// fall back to keyword rank, then vector rank (absent ranks sort last), then
/// `insertion_order`, so the output is fully deterministic.
pub fn reciprocal_rank_fusion(keyword: &[SearchHit], vector: &[SearchHit], k: f32, insertion_order: impl Fn(&str) -> u64) -> Vec<FusedHit> {
    let k = f64::from(k);
    let mut fused: HashMap<&str, FusedHit> = HashMap::new();
    for (i, hit) in keyword.iter().enumerate() {
        let rank = i + 1;
        let entry = fused.entry(hit.id.as_str()).or_insert_with(|| empty(&hit.id));
        if entry.keyword_rank.is_none() {
            entry.keyword_rank = Some(rank);
            entry.score += 1.0 / (k + rank as f64);
        }
    }
    for (i, hit) in vector.iter().enumerate() {
        let rank = i + 1;
        let entry = fused.entry(hit.id.as_str()).or_insert_with(|| empty(&hit.id));
        if entry.vector_rank.is_none() {
            entry.vector_rank = Some(rank);
            entry.score += 1.0 / (k + rank as f64);
        }
    }
    let mut out: Vec<FusedHit> = fused.into_values().collect();
    out.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| rank_cmp(a.keyword_rank, b.keyword_rank))
            .then_with(|| rank_cmp(a.vector_rank, b.vector_rank))
            .then_with(|| insertion_order(&a.id).cmp(&insertion_order(&b.id)))
    });
    out
}

fn empty(id: &str) -> FusedHit { FusedHit { id: id.to_string(), score: 0.0, keyword_rank: None, vector_rank: None } }

fn rank_cmp(a: Option<usize>, b: Option<usize>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
