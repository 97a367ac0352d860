//! Hybrid retrieval
//!
//! Dense (and optionally sparse) similarity search against the vector store,
//! a single deterministic fallback to the default dense vector, weighted score
//! fusion and a stable ranking.

mod fusion;
mod hybrid;

pub use fusion::{rank_hits, weighted_fusion, FusionError, FusionWeights};
pub use hybrid::HybridRetriever;

use crate::store::{PointId, ReviewPayload, StoreFilter};
use serde::{Deserialize, Serialize};

/// Everything the retriever needs for one request; consumed once
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalPlan {
    pub filter: Option<StoreFilter>,
    pub k: usize,
    pub embedding_text: String,
}

/// A ranked review with per-channel and fused scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: PointId,
    pub payload: ReviewPayload,
    pub dense_score: f32,
    pub sparse_score: f32,
    pub combined_score: f32,
}

impl SearchHit {
    /// Review text used as generation context
    pub fn text(&self) -> &str {
        &self.payload.text
    }

    /// Short preview of the review text (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        let text = self.text();
        match text.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.to_string(),
        }
    }
}
