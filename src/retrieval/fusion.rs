//! Reciprocal Rank Fusion algorithm for combining ranked lists

use super::{FusedResult, RetrievedCandidate, RetrieverSource};
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

/// Standard RRF smoothing constant
pub const DEFAULT_RRF_K: f64 = 60.0;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid RRF constant {0}: must be finite and non-negative")]
    InvalidConstant(f64),
}

/// Configuration for fusion algorithm
#[derive(Debug, Clone, Copy)]
pub struct FusionConfig {
    /// RRF K constant (typically 60)
    rrf_k: f64,
}

impl FusionConfig {
    pub fn new(rrf_k: f64) -> Result<Self, FusionError> {
        if !rrf_k.is_finite() || rrf_k < 0.0 {
            return Err(FusionError::InvalidConstant(rrf_k));
        }
        Ok(Self { rrf_k })
    }

    pub fn rrf_k(&self) -> f64 {
        self.rrf_k
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

struct Accumulator {
    score: f64,
    min_rank: usize,
    sources: Vec<RetrieverSource>,
}

/// Apply Reciprocal Rank Fusion to any number of ranked lists
///
/// RRF formula: score(id) = sum over all lists of: 1 / (k + rank)
///
/// Ranks are 1-indexed. Ties on score fall back to the lowest rank the
/// chunk held in any list, then to chunk id, so the output is fully
/// determined by the inputs. The result is truncated to `k` entries.
pub fn reciprocal_rank_fusion(
    lists: &[Vec<RetrievedCandidate>],
    k: usize,
    config: &FusionConfig,
) -> Vec<FusedResult> {
    let mut acc: HashMap<&str, Accumulator> = HashMap::new();

    for list in lists {
        for candidate in list {
            let contribution = 1.0 / (config.rrf_k + candidate.rank as f64);
            let entry = acc
                .entry(candidate.chunk_id.as_str())
                .or_insert_with(|| Accumulator {
                    score: 0.0,
                    min_rank: candidate.rank,
                    sources: Vec::new(),
                });
            entry.score += contribution;
            entry.min_rank = entry.min_rank.min(candidate.rank);
            if !entry.sources.contains(&candidate.source) {
                entry.sources.push(candidate.source);
            }
        }
    }

    let mut merged: Vec<(&str, Accumulator)> = acc.into_iter().collect();
    merged.sort_by(|a, b| {
        b.1.score
            .partial_cmp(&a.1.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.min_rank.cmp(&b.1.min_rank))
            .then_with(|| a.0.cmp(b.0))
    });
    merged.truncate(k);

    merged
        .into_iter()
        .enumerate()
        .map(|(idx, (chunk_id, mut entry))| {
            entry.sources.sort();
            FusedResult {
                chunk_id: chunk_id.to_string(),
                fused_rank: idx + 1,
                fused_score: entry.score,
                contributing_sources: entry.sources,
                rerank_score: None,
            }
        })
        .collect()
}
