/// Live collaborator tests: local embedding models and a running Qdrant
///
/// Run with: cargo test -- --ignored
use reviewlens::config::Config;
use reviewlens::embedding::{EmbeddingProvider, FastEmbedProvider};
use reviewlens::retrieval::{FusionWeights, HybridRetriever};
use reviewlens::store::{QdrantStore, VectorStore};
use std::sync::Arc;

#[tokio::test]
#[ignore] // Requires model download (~500MB)
async fn test_dense_and_sparse_query_embedding() {
    let config = Config::default();
    let provider = FastEmbedProvider::new(
        &config.embedding.model,
        config.embedding.sparse_model.as_deref(),
    )
    .expect("Failed to initialize embedding provider");

    println!(
        "✓ Embedding provider initialized: {} ({}D)",
        provider.model_name(),
        provider.dimension()
    );

    let embedding = provider
        .embed_query("slow service and cold food")
        .await
        .unwrap();

    assert_eq!(embedding.dense.len(), config.embedding.dimension);
    let sparse = embedding.sparse.expect("sparse model configured");
    assert!(!sparse.is_empty());
    assert_eq!(sparse.indices.len(), sparse.values.len());
}

#[tokio::test]
#[ignore] // Requires a Qdrant instance with a populated "reviews" collection
async fn test_live_hybrid_retrieval() {
    let config = Config::default();
    let store = Arc::new(QdrantStore::new(&config.vector_store).unwrap());

    let total = store.count(None).await.unwrap();
    println!("✓ Collection holds {} reviews", total);

    let provider = Arc::new(
        FastEmbedProvider::new(
            &config.embedding.model,
            config.embedding.sparse_model.as_deref(),
        )
        .unwrap(),
    );
    let retriever = HybridRetriever::new(
        provider,
        store,
        FusionWeights::new(config.retrieval.dense_weight, config.retrieval.sparse_weight).unwrap(),
    );

    let hits = retriever.retrieve("friendly staff", None, 10).await.unwrap();
    assert!(hits.len() <= 10);
    for pair in hits.windows(2) {
        assert!(pair[0].combined_score >= pair[1].combined_score);
    }
    for hit in &hits {
        println!("  [{:.3}] {}", hit.combined_score, hit.preview(80));
    }
}
