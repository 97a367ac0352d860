//! Qdrant REST client

use super::{NamedQuery, NamedResults, StoreError, StoreFilter, StoreHit, VectorStore};
use crate::config::VectorStoreConfig;
use crate::embedding::SparseVector;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Qdrant client over its REST API
///
/// Holds one pooled `reqwest::Client`; clone-free and shareable behind `Arc`.
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
    dense_name: String,
    sparse_name: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum QueryVector<'a> {
    Default(&'a [f32]),
    NamedDense {
        name: &'a str,
        vector: &'a [f32],
    },
    NamedSparse {
        name: &'a str,
        vector: &'a SparseVector,
    },
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: QueryVector<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a StoreFilter>,
    limit: usize,
    with_payload: bool,
}

#[derive(Serialize)]
struct SearchBatchRequest<'a> {
    searches: Vec<SearchRequest<'a>>,
}

#[derive(Serialize)]
struct CountRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a StoreFilter>,
    exact: bool,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct CountResult {
    count: u64,
}

impl QdrantStore {
    /// Create a client from configuration; reads the API key from the environment
    pub fn new(config: &VectorStoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| StoreError::Unreachable(format!("client build failed: {}", e)))?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key,
            dense_name: config.dense_vector_name.clone(),
            sparse_name: config.sparse_vector_name.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/collections/{}/points/{}",
            self.base_url, self.collection, path
        )
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, StoreError> {
        let mut request = self.client.post(self.endpoint(path)).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: QdrantResponse<Resp> = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        Ok(parsed.result)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search_named(
        &self,
        query: NamedQuery<'_>,
        filter: Option<&StoreFilter>,
        limit: usize,
    ) -> Result<NamedResults, StoreError> {
        let mut searches = vec![SearchRequest {
            vector: QueryVector::NamedDense {
                name: &self.dense_name,
                vector: query.dense,
            },
            filter,
            limit,
            with_payload: true,
        }];

        if let Some(sparse) = query.sparse {
            searches.push(SearchRequest {
                vector: QueryVector::NamedSparse {
                    name: &self.sparse_name,
                    vector: sparse,
                },
                filter,
                limit,
                with_payload: true,
            });
        }

        let expected = searches.len();
        let mut results: Vec<Vec<StoreHit>> = self
            .post("search/batch", &SearchBatchRequest { searches })
            .await?;

        if results.len() != expected {
            return Err(StoreError::InvalidResponse(format!(
                "expected {} result lists, got {}",
                expected,
                results.len()
            )));
        }

        let sparse = if expected == 2 { results.pop() } else { None };
        let dense = results.pop().unwrap_or_default();

        debug!(
            dense = dense.len(),
            sparse = sparse.as_ref().map(|s| s.len()),
            "Named vector search complete"
        );

        Ok(NamedResults::PerChannel { dense, sparse })
    }

    async fn search_default(
        &self,
        dense: &[f32],
        filter: Option<&StoreFilter>,
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError> {
        let request = SearchRequest {
            vector: QueryVector::Default(dense),
            filter,
            limit,
            with_payload: true,
        };
        self.post("search", &request).await
    }

    async fn count(&self, filter: Option<&StoreFilter>) -> Result<u64, StoreError> {
        let result: CountResult = self
            .post(
                "count",
                &CountRequest {
                    filter,
                    exact: true,
                },
            )
            .await?;
        Ok(result.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Condition;
    use serde_json::json;

    #[test]
    fn test_named_sparse_request_shape() {
        let sparse = SparseVector {
            indices: vec![3, 17],
            values: vec![0.5, 1.25],
        };
        let request = SearchRequest {
            vector: QueryVector::NamedSparse {
                name: "sparse",
                vector: &sparse,
            },
            filter: None,
            limit: 5,
            with_payload: true,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "vector": {"name": "sparse", "vector": {"indices": [3, 17], "values": [0.5, 1.25]}},
                "limit": 5,
                "with_payload": true
            })
        );
    }

    #[test]
    fn test_default_request_carries_filter() {
        let filter = StoreFilter {
            must: vec![Condition::match_value("rating", 1)],
        };
        let dense = [0.25_f32, 0.5];
        let request = SearchRequest {
            vector: QueryVector::Default(&dense),
            filter: Some(&filter),
            limit: 3,
            with_payload: true,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["vector"], json!([0.25, 0.5]));
        assert_eq!(value["filter"]["must"][0]["match"]["value"], json!(1));
    }

    #[test]
    fn test_endpoint() {
        let config = VectorStoreConfig {
            url: "http://localhost:6333/".to_string(),
            collection: "reviews".to_string(),
            api_key_env: "REVIEWLENS_TEST_UNSET_KEY".to_string(),
            dense_vector_name: "dense".to_string(),
            sparse_vector_name: "sparse".to_string(),
            timeout_secs: 5,
        };
        let store = QdrantStore::new(&config).unwrap();
        assert_eq!(
            store.endpoint("count"),
            "http://localhost:6333/collections/reviews/points/count"
        );
    }
}
