//! Brute-force cosine similarity search over chunk embeddings

use super::{RetrievedCandidate, RetrieverSource};
use crate::corpus::CorpusSnapshot;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::service::{call_with_retry, RetryPolicy, ServiceError};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Embeds the query through the embedding service, then ranks every chunk
pub struct SemanticRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    policy: RetryPolicy,
}

impl SemanticRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, policy: RetryPolicy) -> Self {
        Self { embedder, policy }
    }

    pub async fn retrieve(
        &self,
        snapshot: &CorpusSnapshot,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedCandidate>, ServiceError> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let embedder = &self.embedder;
        let embedding = call_with_retry(self.policy, "embed_query", || async move {
            embedder.embed(query).await.map_err(ServiceError::from)
        })
        .await?;

        if embedding.len() != snapshot.dimension() {
            return Err(ServiceError::Response(format!(
                "query embedding has dimension {}, snapshot uses {}",
                embedding.len(),
                snapshot.dimension()
            )));
        }

        let results = rank_by_similarity(snapshot, &embedding, k);
        debug!("Semantic retrieval: {} hits", results.len());
        Ok(results)
    }
}

/// Top `k` chunks by cosine similarity to `query_embedding`
///
/// Equal similarities are ordered by chunk position in the snapshot.
pub fn rank_by_similarity(
    snapshot: &CorpusSnapshot,
    query_embedding: &[f32],
    k: usize,
) -> Vec<RetrievedCandidate> {
    let mut scored: Vec<(usize, f32)> = snapshot
        .chunks()
        .iter()
        .enumerate()
        .map(|(idx, chunk)| (idx, cosine_similarity(query_embedding, &chunk.embedding)))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);

    scored
        .into_iter()
        .enumerate()
        .map(|(rank, (idx, score))| RetrievedCandidate {
            chunk_id: snapshot.chunks()[idx].id.clone(),
            source: RetrieverSource::Semantic,
            rank: rank + 1,
            score,
        })
        .collect()
}
