//! Precision reranking through an external scoring service

use super::FusedResult;
use crate::config::RerankConfig;
use crate::corpus::CorpusSnapshot;
use crate::service::{call_with_retry, RetryPolicy, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Result index {index} out of range for {count} documents")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Higher-fidelity relevance scoring of candidate texts against a query
#[async_trait]
pub trait RerankService: Send + Sync {
    /// Score `documents` against `query`, returning at most `top_n`
    /// `(document index, relevance)` pairs, most relevant first
    async fn score(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<(usize, f32)>, ServiceError>;

    fn model_name(&self) -> &str;
}

/// Cohere rerank API client
pub struct CohereReranker {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct CohereRerankResponse {
    results: Vec<CohereRerankResult>,
}

#[derive(Deserialize)]
struct CohereRerankResult {
    index: usize,
    relevance_score: f32,
}

impl CohereReranker {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, RerankError> {
        let client = Client::builder()
            .build()
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build a client when reranking is enabled and its credential is set
    ///
    /// Returns `Ok(None)` otherwise; the caller reports the stage as skipped.
    pub fn from_config(config: &RerankConfig) -> Result<Option<Self>, RerankError> {
        if !config.enabled {
            debug!("Rerank disabled in configuration");
            return Ok(None);
        }

        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                info!("Rerank enabled: {} via {}", config.model, config.base_url);
                Ok(Some(Self::new(&config.base_url, key, &config.model)?))
            }
            _ => {
                warn!(
                    "Rerank enabled but {} is not set; rerank stage will be skipped",
                    config.api_key_env
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl RerankService for CohereReranker {
    async fn score(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<(usize, f32)>, ServiceError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/rerank", self.base_url);
        let body = json!({
            "model": self.model,
            "query": query,
            "documents": documents,
            "top_n": top_n,
        });

        debug!(url = %url, model = %self.model, "Sending rerank request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Request(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: CohereRerankResponse = serde_json::from_str(&text)
            .map_err(|e| ServiceError::Response(format!("Invalid rerank JSON: {}", e)))?;

        let mut scored: Vec<(usize, f32)> = parsed
            .results
            .into_iter()
            .map(|r| (r.index, r.relevance_score))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_n);

        Ok(scored)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Whether the rerank stage ran for an exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RerankStatus {
    Applied { model: String },
    /// No rerank service configured; fused order passed through
    Skipped,
    /// The service failed; fused order passed through
    Failed { reason: String },
}

impl RerankStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, RerankStatus::Applied { .. })
    }
}

#[derive(Debug)]
pub struct RerankOutcome {
    pub results: Vec<FusedResult>,
    pub status: RerankStatus,
}

/// Optional rerank stage over the fused candidate list
pub struct PrecisionReranker {
    service: Option<Arc<dyn RerankService>>,
    top_n: usize,
    policy: RetryPolicy,
}

impl PrecisionReranker {
    pub fn new(service: Option<Arc<dyn RerankService>>, top_n: usize, policy: RetryPolicy) -> Self {
        Self {
            service,
            top_n: top_n.max(1),
            policy,
        }
    }

    /// A reranker that always passes candidates through
    pub fn disabled() -> Self {
        Self::new(None, 1, RetryPolicy::default())
    }

    pub fn is_configured(&self) -> bool {
        self.service.is_some()
    }

    /// Re-score `candidates` and keep the best `top_n`
    ///
    /// Without a configured service, or when the service fails, the input
    /// is returned unchanged and the status says so.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<FusedResult>,
        snapshot: &CorpusSnapshot,
    ) -> RerankOutcome {
        let Some(service) = &self.service else {
            debug!("Rerank skipped: no service configured");
            return RerankOutcome {
                results: candidates,
                status: RerankStatus::Skipped,
            };
        };

        if candidates.is_empty() {
            return RerankOutcome {
                results: candidates,
                status: RerankStatus::Applied {
                    model: service.model_name().to_string(),
                },
            };
        }

        let documents: Vec<String> = candidates
            .iter()
            .map(|c| {
                snapshot
                    .get(&c.chunk_id)
                    .map(|chunk| chunk.text.clone())
                    .unwrap_or_default()
            })
            .collect();
        let top_n = self.top_n.min(candidates.len());

        let docs = documents.as_slice();
        let scored = call_with_retry(self.policy, "rerank", || async move {
            service.score(query, docs, top_n).await
        })
        .await;

        match scored.map_err(|e| e.to_string()).and_then(|scored| {
            apply_scores(&candidates, scored).map_err(|e| e.to_string())
        }) {
            Ok(results) => {
                debug!("Reranked {} candidates to {}", candidates.len(), results.len());
                RerankOutcome {
                    results,
                    status: RerankStatus::Applied {
                        model: service.model_name().to_string(),
                    },
                }
            }
            Err(reason) => {
                warn!("Rerank failed, keeping fused order: {}", reason);
                RerankOutcome {
                    results: candidates,
                    status: RerankStatus::Failed { reason },
                }
            }
        }
    }
}

fn apply_scores(
    candidates: &[FusedResult],
    scored: Vec<(usize, f32)>,
) -> Result<Vec<FusedResult>, RerankError> {
    let mut results = Vec::with_capacity(scored.len());
    for (position, (index, score)) in scored.into_iter().enumerate() {
        let candidate = candidates.get(index).ok_or(RerankError::IndexOutOfRange {
            index,
            count: candidates.len(),
        })?;
        let mut result = candidate.clone();
        result.fused_rank = position + 1;
        result.rerank_score = Some(score);
        results.push(result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Chunk;
    use crate::retrieval::RetrieverSource;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    /// Scores documents by length, longest first
    struct LengthScorer {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RerankService for LengthScorer {
        async fn score(
            &self,
            _query: &str,
            documents: &[String],
            top_n: usize,
        ) -> Result<Vec<(usize, f32)>, ServiceError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            if self.fail {
                return Err(ServiceError::Unavailable("offline".to_string()));
            }
            let mut scored: Vec<(usize, f32)> = documents
                .iter()
                .enumerate()
                .map(|(i, d)| (i, d.len() as f32))
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
            scored.truncate(top_n);
            Ok(scored)
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    fn fixture() -> (CorpusSnapshot, Vec<FusedResult>) {
        let snap = CorpusSnapshot::build(vec![
            Chunk::new("doc.txt", 0, "short", vec![1.0]),
            Chunk::new("doc.txt", 1, "a much longer passage", vec![1.0]),
            Chunk::new("doc.txt", 2, "medium text", vec![1.0]),
        ])
        .unwrap();
        let fused = snap
            .chunks()
            .iter()
            .enumerate()
            .map(|(i, c)| FusedResult {
                chunk_id: c.id.clone(),
                fused_rank: i + 1,
                fused_score: 1.0 / (61.0 + i as f64),
                contributing_sources: vec![RetrieverSource::Lexical],
                rerank_score: None,
            })
            .collect();
        (snap, fused)
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(1), 0)
    }

    #[tokio::test]
    async fn test_unconfigured_passes_through() {
        let (snap, fused) = fixture();
        let reranker = PrecisionReranker::disabled();
        assert!(!reranker.is_configured());
        let outcome = reranker
            .rerank("q", fused.clone(), &snap)
            .await;

        assert_eq!(outcome.status, RerankStatus::Skipped);
        assert_eq!(outcome.results, fused);
    }

    #[tokio::test]
    async fn test_applied_reorders_and_truncates() {
        let (snap, fused) = fixture();
        let scorer = Arc::new(LengthScorer {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let reranker = PrecisionReranker::new(Some(scorer.clone()), 2, policy());
        assert!(reranker.is_configured());
        let outcome = reranker.rerank("q", fused.clone(), &snap).await;

        assert!(outcome.status.is_applied());
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].chunk_id, fused[1].chunk_id);
        assert_eq!(outcome.results[0].fused_rank, 1);
        assert_eq!(outcome.results[1].chunk_id, fused[2].chunk_id);
        assert!(outcome.results[0].rerank_score.is_some());
        assert_eq!(scorer.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_fused_order() {
        let (snap, fused) = fixture();
        let scorer = Arc::new(LengthScorer {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let outcome = PrecisionReranker::new(Some(scorer), 2, policy())
            .rerank("q", fused.clone(), &snap)
            .await;

        assert!(matches!(outcome.status, RerankStatus::Failed { .. }));
        assert_eq!(outcome.results, fused);
    }

    #[test]
    fn test_out_of_range_index() {
        let (_, fused) = fixture();
        assert!(apply_scores(&fused, vec![(7, 1.0)]).is_err());
    }

    #[test]
    fn test_from_config_disabled() {
        let mut config = crate::config::Config::default().rerank;
        config.enabled = false;
        assert!(CohereReranker::from_config(&config).unwrap().is_none());
    }
}
