use crate::config::Config;
use crate::error::{Result, ReviewLensError, ValidationError};

/// Providers reachable through the OpenAI-compatible chat completions API
pub const SUPPORTED_PROVIDERS: [&str; 3] = ["openai", "groq", "ollama"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_vector_store(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_query(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_runtime(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ReviewLensError::ConfigValidation { errors })
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

    fn validate_vector_store(config: &Config, errors: &mut Vec<ValidationError>) {
        let store = &config.vector_store;
        if !(store.url.starts_with("http://") || store.url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "vector_store.url",
                format!("URL must start with http:// or https://, got '{}'", store.url),
            ));
        }

        if store.collection.is_empty() {
            errors.push(ValidationError::new(
                "vector_store.collection",
                "Collection name cannot be empty",
            ));
        }

        if store.dense_vector_name.is_empty() || store.sparse_vector_name.is_empty() {
            errors.push(ValidationError::new(
                "vector_store.dense_vector_name",
                "Named vector channels cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        let provider = &config.llm.provider;
        if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    SUPPORTED_PROVIDERS, provider
                ),
            ));
        }

        if config.llm.model.is_empty() || config.llm.parser_model.is_empty() {
            errors.push(ValidationError::new(
                "llm.model",
                "Model names cannot be empty",
            ));
        }
    }

    fn validate_query(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.query.relative_time_lookback_days == 0 {
            errors.push(ValidationError::new(
                "query.relative_time_lookback_days",
                "Lookback must be at least one day",
            ));
        }

        if config.query.complaint_ratings.is_empty()
            || config
                .query
                .complaint_ratings
                .iter()
                .any(|r| !(1..=5).contains(r))
        {
            errors.push(ValidationError::new(
                "query.complaint_ratings",
                "Complaint ratings must be a non-empty set of integers 1-5",
            ));
        }

        if config.query.decline_message.trim().is_empty() {
            errors.push(ValidationError::new(
                "query.decline_message",
                "Decline message cannot be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;
        if retrieval.dense_weight < 0.0 || retrieval.sparse_weight < 0.0 {
            errors.push(ValidationError::new(
                "retrieval.dense_weight",
                "Fusion weights cannot be negative",
            ));
        } else if retrieval.dense_weight == 0.0 && retrieval.sparse_weight == 0.0 {
            errors.push(ValidationError::new(
                "retrieval.dense_weight",
                "At least one fusion weight must be positive",
            ));
        }

        if retrieval.default_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.default_k",
                "Default k must be greater than 0",
            ));
        }

        for (i, rule) in retrieval.planner_rules.iter().enumerate() {
            if rule.k == 0 {
                errors.push(ValidationError::new(
                    format!("retrieval.planner_rules[{}].k", i),
                    format!("Rule '{}' must have k greater than 0", rule.name),
                ));
            }
            if rule.keywords.iter().any(|kw| kw.trim().is_empty()) {
                errors.push(ValidationError::new(
                    format!("retrieval.planner_rules[{}].keywords", i),
                    format!("Rule '{}' has an empty keyword", rule.name),
                ));
            }
        }
    }

    fn validate_runtime(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.answer.min_token_chars == 0 {
            errors.push(ValidationError::new(
                "answer.min_token_chars",
                "Token batch size must be greater than 0",
            ));
        }

        if config.stats.max_concurrent == 0 {
            errors.push(ValidationError::new(
                "stats.max_concurrent",
                "Concurrency must be greater than 0",
            ));
        }

        if config.server.socket_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "server.socket_path",
                "Socket path cannot be empty",
            ));
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
    fn test_zero_weights_rejected() {
        let mut config = Config::default();
        config.retrieval.dense_weight = 0.0;
        config.retrieval.sparse_weight = 0.0;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_errors_accumulate() {
        let mut config = Config::default();
        config.llm.provider = "anthropic".to_string();
        config.query.complaint_ratings = vec![0, 2];
        config.retrieval.planner_rules[0].k = 0;

        match ConfigValidator::validate(&config) {
            Err(ReviewLensError::ConfigValidation { errors }) => assert_eq!(errors.len(), 3),
            other => panic!("Expected validation errors, got {:?}", other),
        }
    }
}
