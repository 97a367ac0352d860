//! Query embedding
//!
//! - [`EmbeddingProvider`] trait: text -> dense vector plus optional sparse vector
//! - [`FastEmbedProvider`] for local dense (BGE / MiniLM) and sparse (SPLADE) models
mod provider;

pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};

use serde::{Deserialize, Serialize};

/// Sparse lexical vector (non-zero term weights only)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Embedding of a single query text
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEmbedding {
    pub dense: Vec<f32>,
    /// Present only when the provider has a sparse model loaded
    pub sparse: Option<SparseVector>,
}
