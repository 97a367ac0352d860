/// Embedding provider trait and FastEmbed implementation
use super::{QueryEmbedding, SparseVector};
use async_trait::async_trait;
use fastembed::{
    EmbeddingModel, InitOptions, SparseInitOptions, SparseModel, SparseTextEmbedding,
    TextEmbedding,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for embedding providers
///
/// Implementations are constructed once per process and shared across
/// requests, so they must be safe for concurrent use.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a query: dense always, sparse when the provider supports it
    async fn embed_query(&self, text: &str) -> Result<QueryEmbedding, EmbeddingError>;

    /// Get the dense embedding dimension
    fn dimension(&self) -> usize;

    /// Get the dense model name
    fn model_name(&self) -> &str;
}

/// FastEmbed provider for local embedding generation
///
/// Dense: all-MiniLM-L6-v2 (384), bge-small-en-v1.5 (384) or bge-base-en-v1.5 (768).
/// Sparse: splade-pp-en-v1, optional.
pub struct FastEmbedProvider {
    dense: Arc<TextEmbedding>,
    sparse: Option<Arc<SparseTextEmbedding>>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a provider with the given dense model and optional sparse model
    ///
    /// **Important**: Models are downloaded on-demand to the fastembed cache
    /// on first use.
    pub fn new(model_name: &str, sparse_model: Option<&str>) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                    model_name
                )));
            }
        };

        tracing::info!(
            "Initializing embedding model: {} ({}D)",
            model_name,
            dimension
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);
        let dense = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        let sparse = match sparse_model {
            Some(name) => Some(Arc::new(Self::init_sparse(name)?)),
            None => None,
        };

        Ok(Self {
            dense: Arc::new(dense),
            sparse,
            model_name: model_name.to_string(),
            dimension,
        })
    }

    fn init_sparse(name: &str) -> Result<SparseTextEmbedding, EmbeddingError> {
        let model = match name {
            "splade-pp-en-v1" | "prithivida/Splade_PP_en_v1" => SparseModel::SPLADEPPV1,
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported sparse model: {}. Supported: splade-pp-en-v1",
                    name
                )));
            }
        };

        tracing::info!("Initializing sparse embedding model: {}", name);

        SparseTextEmbedding::try_new(
            SparseInitOptions::new(model).with_show_download_progress(true),
        )
        .map_err(|e| EmbeddingError::InitializationError(e.to_string()))
    }

    /// Whether the sparse channel is available
    pub fn has_sparse(&self) -> bool {
        self.sparse.is_some()
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_query(&self, text: &str) -> Result<QueryEmbedding, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let dense_model = self.dense.clone();
        let sparse_model = self.sparse.clone();
        let expected = self.dimension;
        let text = text.to_string();

        // ONNX inference is CPU-bound; keep it off the async workers
        tokio::task::spawn_blocking(move || {
            let dense = dense_model
                .embed(vec![text.clone()], None)
                .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    EmbeddingError::GenerationError("No embeddings generated".to_string())
                })?;

            if dense.len() != expected {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: dense.len(),
                });
            }

            let sparse = match sparse_model {
                Some(model) => model
                    .embed(vec![text], None)
                    .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?
                    .into_iter()
                    .next()
                    .map(|s| SparseVector {
                        indices: s.indices.into_iter().map(|i| i as u32).collect(),
                        values: s.values,
                    })
                    .filter(|s| !s.is_empty()),
                None => None,
            };

            Ok(QueryEmbedding { dense, sparse })
        })
        .await
        .map_err(|e| EmbeddingError::GenerationError(format!("embedding task failed: {}", e)))?
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
