//! statrag-hybrid
//!
//! Reciprocal Rank Fusion over the keyword and vector rankings, the immutable
//! index generation both indices live in, and mode-dispatched retrieval.

pub mod retrieve;
pub mod rrf;
pub mod snapshot;

pub use retrieve::{RankedChunk, Retrieval};
pub use rrf::{reciprocal_rank_fusion, FusedHit, DEFAULT_RRF_K};
pub use snapshot::{ChunkRecord, IndexHandle, IndexSnapshot};
