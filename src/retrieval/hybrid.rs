//! Hybrid search combining dense and sparse similarity

use super::fusion::{dense_only, rank_hits, store_fused, weighted_fusion, FusionWeights};
use super::{RetrievalPlan, SearchHit};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::store::{NamedQuery, NamedResults, StoreError, StoreFilter, VectorStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hybrid retriever over the shared store and embedding clients
///
/// Retrieval chain, fixed and documented:
/// 1. named dual-vector query (dense channel, sparse channel when available)
/// 2. on failure, exactly one retry against the default dense vector
/// 3. on failure again, an empty result ("no matching reviews")
pub struct HybridRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    weights: FusionWeights,
}

impl HybridRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        weights: FusionWeights,
    ) -> Self {
        Self {
            embedder,
            store,
            weights,
        }
    }

    /// Run a retrieval plan
    pub async fn retrieve_plan(&self, plan: &RetrievalPlan) -> Result<Vec<SearchHit>> {
        self.retrieve(&plan.embedding_text, plan.filter.as_ref(), plan.k)
            .await
    }

    /// Ranked hits for the embedding text, at most `k`
    ///
    /// Store failures never surface as errors; an embedding failure does,
    /// since no search could be issued at all.
    pub async fn retrieve(
        &self,
        embedding_text: &str,
        filter: Option<&StoreFilter>,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_query(embedding_text).await?;

        let query = NamedQuery {
            dense: &embedding.dense,
            sparse: embedding.sparse.as_ref(),
        };

        let hits = match self.store.search_named(query, filter, k).await {
            Ok(results) => self.merge(results),
            Err(named_err) => {
                warn!(
                    "Named vector search failed ({}), retrying with default vector",
                    named_err
                );
                match self.store.search_default(&embedding.dense, filter, k).await {
                    Ok(hits) => dense_only(hits),
                    Err(fallback_err) => {
                        self.log_degraded(&fallback_err);
                        return Ok(Vec::new());
                    }
                }
            }
        };

        let ranked = rank_hits(hits, k);
        info!(
            k,
            hits = ranked.len(),
            filtered = filter.is_some(),
            "Retrieval complete"
        );
        Ok(ranked)
    }

    fn merge(&self, results: NamedResults) -> Vec<SearchHit> {
        match results {
            NamedResults::Fused(hits) => store_fused(hits),
            NamedResults::PerChannel {
                dense,
                sparse: Some(sparse),
            } => {
                debug!(
                    dense = dense.len(),
                    sparse = sparse.len(),
                    "Fusing dense and sparse rankings"
                );
                weighted_fusion(dense, sparse, self.weights)
            }
            NamedResults::PerChannel {
                dense,
                sparse: None,
            } => dense_only(dense),
        }
    }

    fn log_degraded(&self, err: &StoreError) {
        warn!(
            "Vector store unavailable after fallback, returning no results: {}",
            err
        );
    }
}
