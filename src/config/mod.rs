//! Configuration management for ReviewLens
//!
//! Handles loading, validation, profiles and environment overrides. Every
//! tunable the pipeline depends on (fusion weights, planner rule table,
//! relative-time policy) lives here rather than in code.

use crate::error::{Result, ReviewLensError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub vector_store: VectorStoreConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub query: QueryConfig,
    pub retrieval: RetrievalConfig,
    pub answer: AnswerConfig,
    pub stats: StatsConfig,
    pub server: ServerConfig,
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

/// Vector store (Qdrant REST) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub url: String,
    pub collection: String,
    /// Environment variable holding the API key; unset means no auth header
    pub api_key_env: String,
    pub dense_vector_name: String,
    pub sparse_vector_name: String,
    pub timeout_secs: u64,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Sparse (lexical) model; `None` disables the sparse channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_model: Option<String>,
    pub dimension: usize,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    /// Overrides the provider's default OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub api_key_env: String,
    /// Model used for answer synthesis
    pub model: String,
    /// Lighter model used by the query intent parser
    pub parser_model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Query intent parsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// How far back "over time" style phrases reach from the current date
    pub relative_time_lookback_days: u32,
    /// Ratings used for "complaints" / "negative feedback" without explicit range
    pub complaint_ratings: Vec<i64>,
    /// Returned verbatim for off-topic questions
    pub decline_message: String,
}

/// One row of the adaptive retrieval planner table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannerRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub k: usize,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub dense_weight: f32,
    pub sparse_weight: f32,
    /// k used when no planner rule matches
    pub default_k: usize,
    /// Ordered rule table, first match wins
    pub planner_rules: Vec<PlannerRule>,
}

/// Answer synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    /// Minimum buffered characters before a word-boundary token flush
    pub min_token_chars: usize,
    pub max_history_turns: usize,
}

/// Aggregate statistics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    pub max_concurrent: usize,
}

/// Query server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    pub max_message_size: u32,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dense_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse_weight: Option<f32>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReviewLensError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ReviewLensError::Io {
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
        std::fs::write(path, content).map_err(|e| ReviewLensError::Io {
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
            .ok_or_else(|| ReviewLensError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(model) = overrides.parser_model {
            self.llm.parser_model = model;
        }
        if let Some(false) = overrides.sparse_enabled {
            self.embedding.sparse_model = None;
        }
        if let Some(weight) = overrides.dense_weight {
            self.retrieval.dense_weight = weight;
        }
        if let Some(weight) = overrides.sparse_weight {
            self.retrieval.sparse_weight = weight;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: REVIEWLENS_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("REVIEWLENS_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "VECTOR_STORE__URL" => self.vector_store.url = value.to_string(),
            "VECTOR_STORE__COLLECTION" => self.vector_store.collection = value.to_string(),
            "LLM__PROVIDER" => self.llm.provider = value.to_string(),
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__PARSER_MODEL" => self.llm.parser_model = value.to_string(),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "RETRIEVAL__DENSE_WEIGHT" => self.retrieval.dense_weight = parse_f32(path, value)?,
            "RETRIEVAL__SPARSE_WEIGHT" => {
                self.retrieval.sparse_weight = parse_f32(path, value)?
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ReviewLensError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("reviewlens").join("config.toml"))
    }
}

fn parse_f32(path: &str, value: &str) -> Result<f32> {
    value
        .parse()
        .map_err(|_| ReviewLensError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}' as a number", value),
        })
}

fn rule(name: &str, keywords: &[&str], k: usize) -> PlannerRule {
    PlannerRule {
        name: name.to_string(),
        keywords: keywords.iter().map(|kw| kw.to_string()).collect(),
        k,
    }
}

/// Default planner table: analytic, comparison, specific example
pub fn default_planner_rules() -> Vec<PlannerRule> {
    vec![
        rule(
            "analytic",
            &["most common", "trends", "summarize", "how many", "overview"],
            1000,
        ),
        rule(
            "comparison",
            &["compare", "versus", "vs", "difference", "better", "worse"],
            100,
        ),
        rule(
            "specific",
            &["example", "specific", "particular", "tell me about"],
            30,
        ),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            vector_store: VectorStoreConfig {
                url: "http://localhost:6333".to_string(),
                collection: "reviews".to_string(),
                api_key_env: "QDRANT_API_KEY".to_string(),
                dense_vector_name: "dense".to_string(),
                sparse_vector_name: "sparse".to_string(),
                timeout_secs: 30,
            },
            embedding: EmbeddingConfig {
                model: "bge-base-en-v1.5".to_string(),
                sparse_model: Some("splade-pp-en-v1".to_string()),
                dimension: 768,
            },
            llm: LlmConfig {
                provider: "openai".to_string(),
                base_url: None,
                api_key_env: "OPENAI_API_KEY".to_string(),
                model: "gpt-4o-mini".to_string(),
                parser_model: "gpt-4o-mini".to_string(),
                temperature: 0.1,
                timeout_secs: 120,
            },
            query: QueryConfig {
                relative_time_lookback_days: 365,
                complaint_ratings: vec![1, 2],
                decline_message:
                    "I can only answer questions about this business's customer reviews."
                        .to_string(),
            },
            retrieval: RetrievalConfig {
                dense_weight: 0.7,
                sparse_weight: 0.3,
                default_k: 50,
                planner_rules: default_planner_rules(),
            },
            answer: AnswerConfig {
                min_token_chars: 24,
                max_history_turns: 4,
            },
            stats: StatsConfig { max_concurrent: 5 },
            server: ServerConfig {
                socket_path: PathBuf::from("~/.reviewlens/reviewlens.sock"),
                max_message_size: 10 * 1024 * 1024,
            },
            profiles: HashMap::new(),
        }
    }
}
