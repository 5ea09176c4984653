//! Configuration management for Archivist
//!
//! The whole configuration is one explicit value handed to each component at
//! construction. Nothing reads model or service settings from global state.

use crate::error::{ArchivistError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub ingestion: IngestionConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub rerank: RerankConfig,
    pub retrieval: RetrievalConfig,
    pub memory: MemoryConfig,
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub sanitizer: SanitizerConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Source documents to ingest
    pub documents_dir: PathBuf,
    /// Persisted corpus snapshot
    pub index_dir: PathBuf,
    /// Archived chat sessions
    pub history_dir: PathBuf,
}

impl StorageConfig {
    /// Documents, index and history directories under `data_dir`
    pub fn rooted_at(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            documents_dir: data_dir.join("documents"),
            index_dir: data_dir.join("index"),
            history_dir: data_dir.join("history"),
            data_dir,
        }
    }
}

/// Document ingestion and chunking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub allowed_extensions: Vec<String>,
    /// Chunk window, in whitespace tokens
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

/// Generation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// Precision rerank service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub top_n: usize,
    pub timeout_secs: u64,
}

/// Hybrid retrieval parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub lexical_top_k: usize,
    pub semantic_top_k: usize,
    pub fused_top_k: usize,
    /// Reciprocal rank fusion smoothing constant
    pub rrf_k: f64,
    pub bm25_k1: f32,
    pub bm25_b: f32,
}

/// Conversation memory bound
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub token_limit: usize,
}

/// Post-hoc response evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub enabled: bool,
}

/// Additional adversarial phrase patterns on top of the built-in set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SanitizerConfig {
    #[serde(default)]
    pub extra_patterns: Vec<String>,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_enabled: Option<bool>,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RerankConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ArchivistError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ArchivistError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ArchivistError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| ArchivistError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(enabled) = overrides.rerank_enabled {
            self.rerank.enabled = enabled;
        }
        if let Some(enabled) = overrides.evaluation_enabled {
            self.evaluation.enabled = enabled;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: ARCHIVIST_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("ARCHIVIST_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__BASE_URL" => self.llm.base_url = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "RERANK__ENABLED" => self.rerank.enabled = parse_env(path, value)?,
            "EVALUATION__ENABLED" => self.evaluation.enabled = parse_env(path, value)?,
            "MEMORY__TOKEN_LIMIT" => self.memory.token_limit = parse_env(path, value)?,
            "RETRIEVAL__FUSED_TOP_K" => self.retrieval.fused_top_k = parse_env(path, value)?,
            "STORAGE__DATA_DIR" => self.storage = StorageConfig::rooted_at(value),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ArchivistError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("archivist").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| ArchivistError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".archivist"))
    }

    /// Configuration rooted at `data_dir`, with every other value at its default
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.storage = StorageConfig::rooted_at(data_dir);
        config
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ArchivistError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}'", value),
        })
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.archivist");

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig::rooted_at(data_dir),
            ingestion: IngestionConfig {
                allowed_extensions: vec![".pdf".to_string(), ".txt".to_string(), ".md".to_string()],
                chunk_size: 512,
                chunk_overlap: 50,
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                batch_size: 32,
                timeout_secs: 60,
            },
            llm: LlmConfig {
                provider: "groq".to_string(),
                base_url: "https://api.groq.com/openai/v1".to_string(),
                api_key_env: "GROQ_API_KEY".to_string(),
                model: "llama-3.3-70b-versatile".to_string(),
                temperature: 0.1,
                max_tokens: 1024,
                timeout_secs: 60,
                max_retries: 1,
            },
            rerank: RerankConfig {
                enabled: true,
                base_url: "https://api.cohere.com/v1".to_string(),
                api_key_env: "COHERE_API_KEY".to_string(),
                model: "rerank-english-v3.0".to_string(),
                top_n: 3,
                timeout_secs: 30,
            },
            retrieval: RetrievalConfig {
                lexical_top_k: 5,
                semantic_top_k: 5,
                fused_top_k: 5,
                rrf_k: 60.0,
                bm25_k1: 1.2,
                bm25_b: 0.75,
            },
            memory: MemoryConfig { token_limit: 8192 },
            evaluation: EvaluationConfig { enabled: true },
            sanitizer: SanitizerConfig::default(),
            profiles: HashMap::new(),
        }
    }
}
