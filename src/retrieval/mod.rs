//! Hybrid retrieval and reranking
//!
//! Lexical (BM25) and semantic (cosine) retrieval run side by side over the
//! pinned corpus snapshot, are merged with Reciprocal Rank Fusion, and the
//! fused list is optionally re-scored by an external rerank service.

mod fusion;
mod hybrid;
mod lexical;
mod reranker;
mod semantic;

pub use fusion::{reciprocal_rank_fusion, FusionConfig, FusionError, DEFAULT_RRF_K};
pub use hybrid::{HybridRetriever, RetrievalOutcome};
pub use lexical::LexicalRetriever;
pub use reranker::{
    CohereReranker, PrecisionReranker, RerankError, RerankOutcome, RerankService, RerankStatus,
};
pub use semantic::{rank_by_similarity, SemanticRetriever};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which retriever produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrieverSource {
    Lexical,
    Semantic,
}

impl fmt::Display for RetrieverSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrieverSource::Lexical => write!(f, "lexical"),
            RetrieverSource::Semantic => write!(f, "semantic"),
        }
    }
}

/// One entry of a single retriever's ranked list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedCandidate {
    pub chunk_id: String,
    pub source: RetrieverSource,
    /// 1-indexed position in the source list
    pub rank: usize,
    pub score: f32,
}

/// One entry of the fused candidate list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    pub chunk_id: String,
    /// 1-indexed position after fusion (and after rerank, when applied)
    pub fused_rank: usize,
    pub fused_score: f64,
    /// Sorted, without duplicates
    pub contributing_sources: Vec<RetrieverSource>,
    /// Set only when a rerank service re-scored this result
    pub rerank_score: Option<f32>,
}
