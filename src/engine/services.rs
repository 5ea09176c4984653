//! External service handles the engine is constructed with

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, FastEmbedProvider};
use crate::error::{ArchivistError, Result};
use crate::llm::{ChatCompletionsClient, GenerationService};
use crate::retrieval::{CohereReranker, RerankService};
use std::sync::Arc;
use tracing::info;

/// Embedding, generation and (optional) rerank services
#[derive(Clone)]
pub struct Services {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn GenerationService>,
    pub reranker: Option<Arc<dyn RerankService>>,
}

impl Services {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationService>,
        reranker: Option<Arc<dyn RerankService>>,
    ) -> Self {
        Self {
            embedder,
            generator,
            reranker,
        }
    }

    /// Default services from configuration
    ///
    /// The generation credential is checked before the embedding model is
    /// loaded, so a missing key fails fast.
    pub fn from_config(config: &Config) -> Result<Self> {
        let generator = ChatCompletionsClient::from_config(&config.llm)?;
        info!("Generation: {} via {}", config.llm.model, config.llm.base_url);

        let embedder = FastEmbedProvider::new(&config.embedding.model)
            .map_err(|e| ArchivistError::Config(format!("Embedding model: {}", e)))?;

        let reranker = CohereReranker::from_config(&config.rerank)
            .map_err(|e| ArchivistError::Config(format!("Rerank client: {}", e)))?
            .map(|r| Arc::new(r) as Arc<dyn RerankService>);

        Ok(Self::new(Arc::new(embedder), Arc::new(generator), reranker))
    }
}
