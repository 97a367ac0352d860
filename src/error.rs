use crate::embedding::EmbeddingError;
use crate::llm::LlmError;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ReviewLens
#[derive(Error, Debug)]
pub enum ReviewLensError {
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

    /// Query parser output was not valid JSON after fence stripping
    #[error("Failed to parse query parser output: {message} (raw: {raw})")]
    Parse { message: String, raw: String },

    /// Malformed filter shape or timestamp
    #[error("Filter translation failed: {0}")]
    FilterTranslation(String),

    /// Completion collaborator failure during answer synthesis
    #[error("Answer generation failed: {0}")]
    Generation(String),

    /// Embedding collaborator errors
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector store errors outside the retrieval degrade path
    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    /// A streamed answer ended with an `error` event carrying this public text
    #[error("{0}")]
    StreamFailed(String),

    /// Query server errors
    #[error("Server error: {0}")]
    Server(String),

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

impl ReviewLensError {
    /// Message safe to hand back to a caller.
    ///
    /// Collaborator-specific detail (HTTP bodies, model runtime errors) is
    /// only ever logged; callers see a stable, human-readable sentence.
    pub fn public_message(&self) -> String {
        match self {
            Self::Parse { .. } => {
                "Sorry, I could not understand that question. Please try rephrasing it.".to_string()
            }
            Self::FilterTranslation(detail) => {
                format!("The filters derived from your question are invalid: {}", detail)
            }
            Self::Store(_) => {
                "Reviews could not be retrieved right now. Please try again.".to_string()
            }
            Self::Generation(_) => {
                "The answer could not be generated right now. Please try again.".to_string()
            }
            Self::StreamFailed(message) => message.clone(),
            Self::Embedding(_) => {
                "The question could not be processed for search. Please try again.".to_string()
            }
            _ => "An internal error occurred while answering the question.".to_string(),
        }
    }
}

impl From<LlmError> for ReviewLensError {
    fn from(err: LlmError) -> Self {
        ReviewLensError::Generation(err.to_string())
    }
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

/// Result type for ReviewLens operations
pub type Result<T> = std::result::Result<T, ReviewLensError>;
