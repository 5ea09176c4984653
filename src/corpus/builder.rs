//! Turns loaded documents into a corpus snapshot
use super::{Chunk, CorpusError, CorpusSnapshot, Document, SentenceChunker, SkippedFile};
use crate::embedding::EmbeddingProvider;
use crate::service::{call_with_retry, RetryPolicy, ServiceError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output of a corpus build
#[derive(Debug)]
pub struct BuildOutput {
    /// `None` when no document produced any chunk
    pub snapshot: Option<CorpusSnapshot>,
    pub documents_indexed: usize,
    /// Documents that failed chunking or embedding
    pub skipped: Vec<SkippedFile>,
    pub duration_ms: u64,
}

/// Chunks and embeds documents, one document per failure unit
pub struct CorpusBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: SentenceChunker,
    batch_size: usize,
    policy: RetryPolicy,
}

impl CorpusBuilder {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        chunker: SentenceChunker,
        batch_size: usize,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            chunker,
            batch_size: batch_size.max(1),
            policy,
        }
    }

    pub async fn build(&self, documents: Vec<Document>) -> Result<BuildOutput, CorpusError> {
        let start = std::time::Instant::now();
        let total = documents.len();

        info!("Building corpus from {} documents", total);

        let mut chunks = Vec::new();
        let mut skipped = Vec::new();
        let mut documents_indexed = 0;

        for document in documents {
            match self.embed_document(&document).await {
                Ok(doc_chunks) if doc_chunks.is_empty() => {
                    skipped.push(SkippedFile {
                        path: PathBuf::from(&document.source_uri),
                        reason: "no text to index".to_string(),
                    });
                }
                Ok(doc_chunks) => {
                    debug!("{}: {} chunks", document.source_uri, doc_chunks.len());
                    documents_indexed += 1;
                    chunks.extend(doc_chunks);
                }
                Err(e) => {
                    warn!("Failed to embed {}: {}", document.source_uri, e);
                    skipped.push(SkippedFile {
                        path: PathBuf::from(&document.source_uri),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let snapshot = if chunks.is_empty() {
            None
        } else {
            Some(CorpusSnapshot::build(chunks)?)
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Corpus build complete: {} documents indexed, {} skipped, {}ms",
            documents_indexed,
            skipped.len(),
            duration_ms
        );

        Ok(BuildOutput {
            snapshot,
            documents_indexed,
            skipped,
            duration_ms,
        })
    }

    async fn embed_document(&self, document: &Document) -> Result<Vec<Chunk>, ServiceError> {
        let texts = self.chunker.split(&document.text);
        let mut chunks = Vec::with_capacity(texts.len());

        for (batch_idx, batch) in texts.chunks(self.batch_size).enumerate() {
            let embedder = &self.embedder;
            let embeddings = call_with_retry(self.policy, "embed_batch", || async move {
                embedder.embed_batch(batch).await.map_err(ServiceError::from)
            })
            .await?;

            if embeddings.len() != batch.len() {
                return Err(ServiceError::Response(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            let offset = batch_idx * self.batch_size;
            for (i, (text, embedding)) in batch.iter().zip(embeddings).enumerate() {
                chunks.push(Chunk::new(
                    document.source_uri.clone(),
                    offset + i,
                    text.clone(),
                    embedding,
                ));
            }
        }

        Ok(chunks)
    }
}
