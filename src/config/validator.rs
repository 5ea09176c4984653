use crate::config::Config;
use crate::error::{ArchivistError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_ingestion(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_rerank(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_memory(config, &mut errors);
        Self::validate_sanitizer(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ArchivistError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        let dirs = [
            ("storage.data_dir", &config.storage.data_dir),
            ("storage.documents_dir", &config.storage.documents_dir),
            ("storage.index_dir", &config.storage.index_dir),
            ("storage.history_dir", &config.storage.history_dir),
        ];
        for (path, dir) in dirs {
            if dir.as_os_str().is_empty() {
                errors.push(ValidationError::new(path, "Directory path cannot be empty"));
            }
        }
    }

    fn validate_ingestion(config: &Config, errors: &mut Vec<ValidationError>) {
        let ingestion = &config.ingestion;

        if ingestion.allowed_extensions.is_empty() {
            errors.push(ValidationError::new(
                "ingestion.allowed_extensions",
                "At least one file extension must be allowed",
            ));
        }

        if ingestion.chunk_size == 0 {
            errors.push(ValidationError::new(
                "ingestion.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        if ingestion.chunk_overlap >= ingestion.chunk_size {
            errors.push(ValidationError::new(
                "ingestion.chunk_overlap",
                format!(
                    "Chunk overlap ({}) must be smaller than chunk size ({})",
                    ingestion.chunk_overlap, ingestion.chunk_size
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "embedding.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    // Credential presence is checked when the generation client is built,
    // not here, so `config validate` works on machines without keys.
    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        let provider = &config.llm.provider;
        let valid_providers = ["groq", "openai", "ollama"];
        if !valid_providers.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    valid_providers, provider
                ),
            ));
        }

        if config.llm.model.is_empty() {
            errors.push(ValidationError::new("llm.model", "Model name cannot be empty"));
        }

        if config.llm.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "llm.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_rerank(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.rerank.top_n == 0 {
            errors.push(ValidationError::new(
                "rerank.top_n",
                "Rerank top_n must be greater than 0",
            ));
        }

        if config.rerank.top_n > config.retrieval.fused_top_k {
            errors.push(ValidationError::new(
                "rerank.top_n",
                format!(
                    "Rerank top_n ({}) cannot exceed retrieval.fused_top_k ({})",
                    config.rerank.top_n, config.retrieval.fused_top_k
                ),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        for (path, k) in [
            ("retrieval.lexical_top_k", retrieval.lexical_top_k),
            ("retrieval.semantic_top_k", retrieval.semantic_top_k),
            ("retrieval.fused_top_k", retrieval.fused_top_k),
        ] {
            if k == 0 {
                errors.push(ValidationError::new(path, "k must be at least 1"));
            }
        }

        if !retrieval.rrf_k.is_finite() || retrieval.rrf_k < 0.0 {
            errors.push(ValidationError::new(
                "retrieval.rrf_k",
                format!("RRF constant must be a finite value >= 0, got {}", retrieval.rrf_k),
            ));
        }

        if retrieval.bm25_k1 < 0.0 {
            errors.push(ValidationError::new(
                "retrieval.bm25_k1",
                "BM25 k1 must be non-negative",
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.bm25_b) {
            errors.push(ValidationError::new(
                "retrieval.bm25_b",
                format!("BM25 b must be between 0.0 and 1.0, got {}", retrieval.bm25_b),
            ));
        }
    }

    fn validate_memory(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.memory.token_limit == 0 {
            errors.push(ValidationError::new(
                "memory.token_limit",
                "Token limit must be greater than 0",
            ));
        }
    }

    fn validate_sanitizer(config: &Config, errors: &mut Vec<ValidationError>) {
        for (i, pattern) in config.sanitizer.extra_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(ValidationError::new(
                    format!("sanitizer.extra_patterns[{}]", i),
                    format!("Invalid regex '{}': {}", pattern, e),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk() {
        let mut config = Config::default();
        config.ingestion.chunk_overlap = config.ingestion.chunk_size;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_zero_k_rejected() {
        let mut config = Config::default();
        config.retrieval.semantic_top_k = 0;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.llm.provider = "invalid".to_string();
        config.memory.token_limit = 0;
        config.sanitizer.extra_patterns = vec!["(unclosed".to_string()];

        match ConfigValidator::validate(&config) {
            Err(ArchivistError::ConfigValidation { errors }) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
