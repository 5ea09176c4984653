//! Retrieval-augmented answering engine
//!
//! [`RagEngine`] is built explicitly from a [`Config`] and a set of
//! [`Services`]. It owns the active corpus snapshot and runs one exchange
//! per [`RagEngine::ask`]: sanitize, answer, evaluate.

mod services;

pub use services::Services;

use crate::chat::{ChatMemory, ChatTurn, ConversationalAnswerer};
use crate::config::Config;
use crate::corpus::{
    load_snapshot, save_snapshot, Chunk, CorpusBuilder, DocumentLoader, SentenceChunker,
    SkippedFile, SnapshotStore,
};
use crate::error::{ArchivistError, Result};
use crate::evaluation::ResponseEvaluator;
use crate::retrieval::{
    FusedResult, HybridRetriever, PrecisionReranker, RerankStatus, SemanticRetriever,
};
use crate::sanitizer::InputSanitizer;
use crate::service::{Degradation, RetryPolicy};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Summary of one index build
#[derive(Debug)]
pub struct IndexReport {
    pub documents_indexed: usize,
    pub chunks: usize,
    /// Files skipped while loading or embedding
    pub skipped: Vec<SkippedFile>,
    /// Version of the installed snapshot; `None` when nothing was indexed
    pub version: Option<String>,
    pub duration_ms: u64,
}

/// Everything produced by one question
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    /// The question as sanitized, so moderated text never re-enters history
    pub user_turn: ChatTurn,
    /// Carries the evaluation when one was produced
    pub assistant_turn: ChatTurn,
    pub cited_chunks: Vec<Chunk>,
    pub standalone_query: String,
    pub retrieval: Vec<FusedResult>,
    pub rerank: RerankStatus,
    pub degradations: Vec<Degradation>,
    pub moderated: bool,
}

pub struct RagEngine {
    config: Config,
    store: SnapshotStore,
    sanitizer: InputSanitizer,
    builder: CorpusBuilder,
    answerer: ConversationalAnswerer,
    evaluator: Option<ResponseEvaluator>,
}

impl RagEngine {
    pub fn new(config: Config, services: Services) -> Result<Self> {
        let llm_policy = RetryPolicy::new(config.llm.timeout(), config.llm.max_retries);
        let embed_policy = RetryPolicy::new(config.embedding.timeout(), config.llm.max_retries);
        let rerank_policy = RetryPolicy::new(config.rerank.timeout(), config.llm.max_retries);

        let sanitizer = InputSanitizer::new(&config.sanitizer.extra_patterns)?;

        let builder = CorpusBuilder::new(
            services.embedder.clone(),
            SentenceChunker::new(config.ingestion.chunk_size, config.ingestion.chunk_overlap),
            config.embedding.batch_size,
            embed_policy,
        );

        let reranker =
            PrecisionReranker::new(services.reranker.clone(), config.rerank.top_n, rerank_policy);
        if reranker.is_configured() {
            info!("Rerank enabled (top {})", config.rerank.top_n);
        } else {
            info!("Rerank not configured; fused order will be kept");
        }

        let retriever = HybridRetriever::new(
            SemanticRetriever::new(services.embedder.clone(), embed_policy),
            reranker,
            &config.retrieval,
        )
        .map_err(|e| ArchivistError::InvalidConfigValue {
            path: "retrieval.rrf_k".to_string(),
            message: e.to_string(),
        })?;

        let answerer = ConversationalAnswerer::new(
            services.generator.clone(),
            retriever,
            ChatMemory::new(config.memory.token_limit),
            llm_policy,
        );

        let evaluator = config
            .evaluation
            .enabled
            .then(|| ResponseEvaluator::new(services.generator.clone(), llm_policy));

        Ok(Self {
            config,
            store: SnapshotStore::new(),
            sanitizer,
            builder,
            answerer,
            evaluator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Install the persisted snapshot, if one exists; returns its version
    pub fn load_persisted(&self) -> Result<Option<String>> {
        let loaded = load_snapshot(&self.config.storage.index_dir).map_err(|e| {
            warn!("Persisted snapshot unreadable ({}); run 'archivist index' to rebuild", e);
            e
        })?;
        match loaded {
            Some(snapshot) => {
                let version = snapshot.version().to_string();
                self.store.install(snapshot);
                Ok(Some(version))
            }
            None => {
                info!(
                    "No persisted snapshot in {}",
                    self.config.storage.index_dir.display()
                );
                Ok(None)
            }
        }
    }

    /// Ingest `dir`, build a new snapshot, persist it and make it active
    ///
    /// When no document yields any chunk the active snapshot is left as is.
    pub async fn build_index(&self, dir: &Path, extensions: &[String]) -> Result<IndexReport> {
        let load = DocumentLoader::load_dir(dir, extensions)?;
        let mut skipped = load.skipped;

        let output = self.builder.build(load.documents).await?;
        skipped.extend(output.skipped);

        let (chunks, version) = match output.snapshot {
            Some(snapshot) => {
                save_snapshot(&snapshot, &self.config.storage.index_dir)?;
                let summary = (snapshot.len(), Some(snapshot.version().to_string()));
                self.store.install(snapshot);
                summary
            }
            None => {
                warn!("No documents indexed from {}; keeping current index", dir.display());
                (0, None)
            }
        };

        Ok(IndexReport {
            documents_indexed: output.documents_indexed,
            chunks,
            skipped,
            version,
            duration_ms: output.duration_ms,
        })
    }

    /// Run one exchange against the active snapshot
    ///
    /// Rejects the question with `EmptyCorpus` before any retrieval when no
    /// index is active. The snapshot is pinned for the whole exchange, so a
    /// concurrent rebuild never changes what this question sees.
    pub async fn ask(&self, history: &[ChatTurn], question: &str) -> Result<Exchange> {
        let snapshot = self.store.current().ok_or(ArchivistError::EmptyCorpus)?;

        let sanitized = self.sanitizer.inspect(question);
        let moderated = sanitized.is_moderated();
        let answer = self
            .answerer
            .answer(&snapshot, history, &sanitized.text)
            .await?;

        let mut degradations = answer.degradations;
        let mut assistant_turn = ChatTurn::assistant(answer.answer_text.clone());

        match &self.evaluator {
            Some(evaluator) => {
                let report = evaluator
                    .evaluate(&sanitized.text, &answer.answer_text, &answer.cited_chunks)
                    .await;
                if let Some(evaluation) = report.evaluation {
                    assistant_turn = assistant_turn.with_evaluation(evaluation);
                }
                degradations.extend(report.degradations);
            }
            None => degradations.push(Degradation::EvaluationDisabled),
        }

        Ok(Exchange {
            user_turn: ChatTurn::user(sanitized.text),
            assistant_turn,
            cited_chunks: answer.cited_chunks,
            standalone_query: answer.standalone_query,
            retrieval: answer.retrieval,
            rerank: answer.rerank,
            degradations,
            moderated,
        })
    }
}
