//! Hybrid retrieval combining lexical and semantic search

use crate::config::RetrievalConfig;
use crate::corpus::CorpusSnapshot;
use crate::retrieval::{
    reciprocal_rank_fusion, FusedResult, FusionConfig, FusionError, LexicalRetriever,
    PrecisionReranker, RerankStatus, SemanticRetriever,
};
use crate::service::Degradation;
use serde::Serialize;
use tracing::{debug, warn};

/// Fused (and possibly reranked) candidates for one query
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    pub results: Vec<FusedResult>,
    pub rerank: RerankStatus,
    pub degradations: Vec<Degradation>,
}

/// Hybrid retriever over the pinned snapshot of one exchange
pub struct HybridRetriever {
    lexical: LexicalRetriever,
    semantic: SemanticRetriever,
    reranker: PrecisionReranker,
    fusion: FusionConfig,
    lexical_top_k: usize,
    semantic_top_k: usize,
    fused_top_k: usize,
}

impl HybridRetriever {
    pub fn new(
        semantic: SemanticRetriever,
        reranker: PrecisionReranker,
        config: &RetrievalConfig,
    ) -> Result<Self, FusionError> {
        Ok(Self {
            lexical: LexicalRetriever::new(config.bm25_k1, config.bm25_b),
            semantic,
            reranker,
            fusion: FusionConfig::new(config.rrf_k)?,
            lexical_top_k: config.lexical_top_k,
            semantic_top_k: config.semantic_top_k,
            fused_top_k: config.fused_top_k,
        })
    }

    /// Run both retrievers, fuse, then rerank if a service is configured
    ///
    /// Never fails: a semantic retrieval failure falls back to lexical
    /// results only and is reported as a degradation. An empty result set
    /// is a valid outcome.
    pub async fn retrieve(&self, snapshot: &CorpusSnapshot, query: &str) -> RetrievalOutcome {
        let mut degradations = Vec::new();

        // Step 1: Parallel lexical + semantic search
        let lexical_future = async { self.lexical.retrieve(snapshot, query, self.lexical_top_k) };
        let (lexical, semantic) = tokio::join!(
            lexical_future,
            self.semantic.retrieve(snapshot, query, self.semantic_top_k)
        );

        let semantic = match semantic {
            Ok(results) => results,
            Err(e) => {
                warn!("Semantic retrieval failed, continuing lexical-only: {}", e);
                degradations.push(Degradation::SemanticUnavailable(e.to_string()));
                Vec::new()
            }
        };

        debug!(
            "Retrieved {} lexical and {} semantic candidates",
            lexical.len(),
            semantic.len()
        );

        // Step 2: Reciprocal Rank Fusion
        let fused = reciprocal_rank_fusion(&[lexical, semantic], self.fused_top_k, &self.fusion);

        // Step 3: Rerank if configured
        let outcome = self.reranker.rerank(query, fused, snapshot).await;
        match &outcome.status {
            RerankStatus::Applied { .. } => {}
            RerankStatus::Skipped => degradations.push(Degradation::RerankSkipped),
            RerankStatus::Failed { reason } => {
                degradations.push(Degradation::RerankFailed(reason.clone()))
            }
        }

        RetrievalOutcome {
            results: outcome.results,
            rerank: outcome.status,
            degradations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::corpus::Chunk;
    use crate::embedding::{EmbeddingError, EmbeddingProvider};
    use crate::retrieval::RetrieverSource;
    use crate::service::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct StubEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if self.fail {
                return Err(EmbeddingError::GenerationError("model offline".to_string()));
            }
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn retriever(fail: bool) -> HybridRetriever {
        let policy = RetryPolicy::new(Duration::from_secs(1), 0).with_backoff(Duration::ZERO);
        let semantic = SemanticRetriever::new(Arc::new(StubEmbedder { fail }), policy);
        HybridRetriever::new(
            semantic,
            PrecisionReranker::disabled(),
            &Config::default().retrieval,
        )
        .unwrap()
    }

    fn snapshot() -> CorpusSnapshot {
        CorpusSnapshot::build(vec![
            Chunk::new("doc.txt", 0, "The sky is blue.", vec![1.0, 0.0]),
            Chunk::new("doc.txt", 1, "Grass is green.", vec![0.0, 1.0]),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_hybrid_fuses_both_sources() {
        let snap = snapshot();
        let outcome = retriever(false).retrieve(&snap, "What color is the sky?").await;

        assert_eq!(outcome.results[0].chunk_id, snap.chunks()[0].id);
        assert_eq!(
            outcome.results[0].contributing_sources,
            vec![RetrieverSource::Lexical, RetrieverSource::Semantic]
        );
        assert_eq!(outcome.rerank, RerankStatus::Skipped);
        assert_eq!(outcome.degradations, vec![Degradation::RerankSkipped]);
    }

    #[tokio::test]
    async fn test_semantic_failure_degrades_to_lexical() {
        let snap = snapshot();
        let outcome = retriever(true).retrieve(&snap, "What color is the sky?").await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].chunk_id, snap.chunks()[0].id);
        assert!(matches!(
            outcome.degradations[0],
            Degradation::SemanticUnavailable(_)
        ));
    }
}
