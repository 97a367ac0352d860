//! Shared in-memory collaborators for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reviewlens::config::Config;
use reviewlens::embedding::{EmbeddingError, EmbeddingProvider, QueryEmbedding};
use reviewlens::engine::{RagEngine, ServiceContext};
use reviewlens::llm::{Completion, CompletionProvider, LlmError};
use reviewlens::store::{
    NamedQuery, NamedResults, PointId, ReviewPayload, StoreError, StoreFilter, StoreHit,
    VectorStore,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn review(id: u64, rating: i64, text: &str) -> StoreHit {
    StoreHit {
        id: PointId::Num(id),
        score: 1.0 - id as f32 / 100.0,
        payload: ReviewPayload {
            text: text.to_string(),
            rating: Some(rating),
            ..Default::default()
        },
    }
}

/// Store serving a fixed list of hits on the dense channel
#[derive(Default)]
pub struct FakeStore {
    pub hits: Vec<StoreHit>,
    pub searches: AtomicUsize,
    pub filters: Mutex<Vec<Option<StoreFilter>>>,
}

impl FakeStore {
    pub fn with_hits(hits: Vec<StoreHit>) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn search_named(
        &self,
        _query: NamedQuery<'_>,
        filter: Option<&StoreFilter>,
        limit: usize,
    ) -> Result<NamedResults, StoreError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.filters.lock().unwrap().push(filter.cloned());
        Ok(NamedResults::PerChannel {
            dense: self.hits.iter().take(limit).cloned().collect(),
            sparse: None,
        })
    }

    async fn search_default(
        &self,
        _dense: &[f32],
        _filter: Option<&StoreFilter>,
        limit: usize,
    ) -> Result<Vec<StoreHit>, StoreError> {
        Ok(self.hits.iter().take(limit).cloned().collect())
    }

    async fn count(&self, _filter: Option<&StoreFilter>) -> Result<u64, StoreError> {
        Ok(self.hits.len() as u64)
    }
}

pub struct FakeEmbedder;

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed_query(&self, _text: &str) -> Result<QueryEmbedding, EmbeddingError> {
        Ok(QueryEmbedding {
            dense: vec![0.5; 4],
            sparse: None,
        })
    }

    fn dimension(&self) -> usize {
        4
    }

    fn model_name(&self) -> &str {
        "fake-embedder"
    }
}

/// Parser model returning a fixed reply
pub struct CannedParser {
    pub reply: String,
}

impl CannedParser {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
        }
    }
}

#[async_trait]
impl CompletionProvider for CannedParser {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(self.reply.clone())
    }

    async fn stream(&self, prompt: &str) -> Result<Completion, LlmError> {
        Ok(Completion::FullText(self.complete(prompt).await?))
    }

    fn model_name(&self) -> &str {
        "canned-parser"
    }
}

/// Answer model streaming a fixed list of chunks
pub struct ChunkedAnswer {
    pub chunks: Vec<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ChunkedAnswer {
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionProvider for ChunkedAnswer {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.chunks.concat())
    }

    async fn stream(&self, prompt: &str) -> Result<Completion, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let items: Vec<Result<String, LlmError>> = self.chunks.iter().cloned().map(Ok).collect();
        Ok(Completion::ChunkStream(stream::iter(items).boxed()))
    }

    fn model_name(&self) -> &str {
        "chunked-answer"
    }
}

/// Sets its flag when dropped
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Answer model that streams one sentence every few milliseconds, forever
#[derive(Default)]
pub struct EndlessAnswer {
    pub produced: Arc<AtomicUsize>,
    pub dropped: Arc<AtomicBool>,
}

#[async_trait]
impl CompletionProvider for EndlessAnswer {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Request("endless answers cannot complete".to_string()))
    }

    async fn stream(&self, _prompt: &str) -> Result<Completion, LlmError> {
        let state = (self.produced.clone(), DropFlag(self.dropped.clone()));
        let chunks = stream::unfold(state, |(produced, flag)| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let n = produced.fetch_add(1, Ordering::SeqCst);
            Some((Ok(format!("Sentence {}. ", n)), (produced, flag)))
        });
        Ok(Completion::ChunkStream(chunks.boxed()))
    }

    fn model_name(&self) -> &str {
        "endless-answer"
    }
}

pub fn engine_with(
    store: Arc<FakeStore>,
    parser: Arc<dyn CompletionProvider>,
    answer: Arc<dyn CompletionProvider>,
) -> Arc<RagEngine> {
    engine_with_config(Config::default(), store, parser, answer)
}

pub fn engine_with_config(
    config: Config,
    store: Arc<FakeStore>,
    parser: Arc<dyn CompletionProvider>,
    answer: Arc<dyn CompletionProvider>,
) -> Arc<RagEngine> {
    let context = ServiceContext::new(config, store, Arc::new(FakeEmbedder), answer, parser);
    Arc::new(RagEngine::new(context).expect("default config builds an engine"))
}
