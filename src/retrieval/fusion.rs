//! Weighted score fusion and deterministic ranking

use super::SearchHit;
use crate::store::{PointId, StoreHit};
use ahash::{HashMap, HashMapExt};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid weight configuration: weights must be non-negative and not both zero")]
    InvalidWeights,
}

/// Per-channel weights; they need not sum to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub dense: f32,
    pub sparse: f32,
}

impl FusionWeights {
    pub fn new(dense: f32, sparse: f32) -> Result<Self, FusionError> {
        if dense < 0.0 || sparse < 0.0 || (dense == 0.0 && sparse == 0.0) {
            return Err(FusionError::InvalidWeights);
        }
        Ok(Self { dense, sparse })
    }
}

/// Fuse separate dense and sparse rankings
///
/// combined = dense * w_dense + sparse * w_sparse, a document missing from a
/// channel scoring 0 there. Output is unordered; see [`rank_hits`].
pub fn weighted_fusion(
    dense: Vec<StoreHit>,
    sparse: Vec<StoreHit>,
    weights: FusionWeights,
) -> Vec<SearchHit> {
    let mut merged: HashMap<PointId, SearchHit> = HashMap::with_capacity(dense.len() + sparse.len());

    for hit in dense {
        merged
            .entry(hit.id.clone())
            .and_modify(|existing| existing.dense_score = existing.dense_score.max(hit.score))
            .or_insert(SearchHit {
                id: hit.id,
                payload: hit.payload,
                dense_score: hit.score,
                sparse_score: 0.0,
                combined_score: 0.0,
            });
    }

    for hit in sparse {
        merged
            .entry(hit.id.clone())
            .and_modify(|existing| existing.sparse_score = existing.sparse_score.max(hit.score))
            .or_insert(SearchHit {
                id: hit.id,
                payload: hit.payload,
                dense_score: 0.0,
                sparse_score: hit.score,
                combined_score: 0.0,
            });
    }

    merged
        .into_values()
        .map(|mut hit| {
            hit.combined_score = hit.dense_score * weights.dense + hit.sparse_score * weights.sparse;
            hit
        })
        .collect()
}

/// Hits from a dense-only ranking: the combined score is the dense score
pub fn dense_only(hits: Vec<StoreHit>) -> Vec<SearchHit> {
    hits.into_iter()
        .map(|hit| SearchHit {
            id: hit.id,
            payload: hit.payload,
            dense_score: hit.score,
            sparse_score: 0.0,
            combined_score: hit.score,
        })
        .collect()
}

/// Hits already fused by the store: only the combined score is known
pub fn store_fused(hits: Vec<StoreHit>) -> Vec<SearchHit> {
    hits.into_iter()
        .map(|hit| SearchHit {
            id: hit.id,
            payload: hit.payload,
            dense_score: 0.0,
            sparse_score: 0.0,
            combined_score: hit.score,
        })
        .collect()
}

/// Sort by combined score descending, id ascending on ties, keep the top k
pub fn rank_hits(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.combined_score
            .total_cmp(&a.combined_score)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(k);
    hits
}
