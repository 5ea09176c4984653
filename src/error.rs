use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Archivist
#[derive(Error, Debug)]
pub enum ArchivistError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// A required credential for the generation service is absent
    #[error("Missing credential: environment variable {env} is not set")]
    MissingCredential { env: String },

    /// No corpus snapshot has been built or loaded yet
    #[error("No index available: build the index first (`archivist index`)")]
    EmptyCorpus,

    /// Corpus snapshot construction or persistence errors
    #[error("Corpus error: {0}")]
    Corpus(#[from] crate::corpus::CorpusError),

    /// Generation failed after retries; the session stays usable
    #[error("Answer unavailable: {reason}")]
    AnswerUnavailable { reason: String },

    /// Session not found
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    /// Session id contains characters outside the allowed set
    #[error("Invalid session id: {id}")]
    InvalidSessionId { id: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Archivist operations
pub type Result<T> = std::result::Result<T, ArchivistError>;
