//! Vector store collaborator
//!
//! The core only talks to the store through [`VectorStore`]; the Qdrant REST
//! client is the production implementation.

mod filter;
mod qdrant;

pub use filter::{Condition, MatchCondition, RangeCondition, StoreFilter};
pub use qdrant::QdrantStore;

use crate::embedding::SparseVector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Vector store unreachable: {0}")]
    Unreachable(String),

    #[error("Vector store rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid vector store response: {0}")]
    InvalidResponse(String),
}

/// Point identifier. Qdrant accepts unsigned integers or UUID strings.
///
/// Ordering: numeric ids sort before string ids, numerics by value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{}", n),
            PointId::Uuid(s) => write!(f, "{}", s),
        }
    }
}

/// Review creation time as stored in the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewTime {
    /// Epoch seconds, the indexed form used by range filters
    Epoch(f64),
    Iso(String),
}

/// Review payload stored alongside each point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewPayload {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub rating: Option<i64>,

    #[serde(rename = "createTime", default)]
    pub create_time: Option<ReviewTime>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(rename = "review_id", alias = "reviewId", default)]
    pub review_id: Option<String>,
}

/// Raw ranked hit as returned by the store for a single channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreHit {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: ReviewPayload,
}

/// Vectors for a named dual-vector query
#[derive(Debug, Clone, Copy)]
pub struct NamedQuery<'a> {
    pub dense: &'a [f32],
    pub sparse: Option<&'a SparseVector>,
}

/// Result of a named dual-vector query
#[derive(Debug, Clone)]
pub enum NamedResults {
    /// The store fused both channels itself and returned one ranking
    Fused(Vec<StoreHit>),
    /// Separate per-channel rankings, fused by the caller
    PerChannel {
        dense: Vec<StoreHit>,
        sparse: Option<Vec<StoreHit>>,
    },
}

/// Vector store collaborator. Implementations must be safe for concurrent use.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Similarity query against the named dense (and optional sparse) vectors
    async fn search_named(
        &self,
        query: NamedQuery<'_>,
        filter: Option<&StoreFilter>,
        limit: usize,
    ) -> Result<NamedResults, StoreError>;

    /// Similarity query against the collection's default (unnamed) vector
    async fn search_default(
        &self,
        dense: &[f32],
        filter: Option<&StoreFilter>,
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError>;

    /// Count points matching the filter (`None` counts everything)
    async fn count(&self, filter: Option<&StoreFilter>) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_ordering() {
        let mut ids = vec![
            PointId::Uuid("b".to_string()),
            PointId::Num(10),
            PointId::Uuid("a".to_string()),
            PointId::Num(2),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                PointId::Num(2),
                PointId::Num(10),
                PointId::Uuid("a".to_string()),
                PointId::Uuid("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_payload_deserialization() {
        let hit: StoreHit = serde_json::from_value(serde_json::json!({
            "id": 7,
            "score": 0.42,
            "payload": {
                "text": "Great sandwiches",
                "rating": 5,
                "createTime": 1735689600.0,
                "author": "Sam",
                "review_id": "r-7"
            }
        }))
        .unwrap();

        assert_eq!(hit.id, PointId::Num(7));
        assert_eq!(hit.payload.rating, Some(5));
        assert_eq!(hit.payload.create_time, Some(ReviewTime::Epoch(1735689600.0)));
        assert_eq!(hit.payload.review_id.as_deref(), Some("r-7"));
    }
}
