//! Request pipeline: parse -> translate -> plan -> retrieve -> synthesize

use crate::answer::{AnswerSynthesisStreamer, SynthesisInput};
use crate::config::Config;
use crate::embedding::{EmbeddingProvider, FastEmbedProvider};
use crate::error::{Result, ReviewLensError};
use crate::llm::{CompletionProvider, OpenAiCompatClient};
use crate::models::{QueryRequest, QueryResponse, StreamEvent};
use crate::query::{AdaptiveRetrievalPlanner, FilterTranslator, ParsedQuery, QueryIntentParser};
use crate::retrieval::{FusionWeights, HybridRetriever, RetrievalPlan, SearchHit};
use crate::store::{QdrantStore, VectorStore};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, Instrument, Span};
use uuid::Uuid;

/// Buffer between the producing task and the event consumer
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Collaborators built once at startup and shared by every request
pub struct ServiceContext {
    pub config: Config,
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub completion: Arc<dyn CompletionProvider>,
    pub parser_completion: Arc<dyn CompletionProvider>,
}

impl ServiceContext {
    /// Build the production collaborators
    ///
    /// Blocks while embedding models load; call before serving traffic.
    pub fn from_config(config: Config) -> Result<Self> {
        let store: Arc<dyn VectorStore> = Arc::new(QdrantStore::new(&config.vector_store)?);

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(FastEmbedProvider::new(
            &config.embedding.model,
            config.embedding.sparse_model.as_deref(),
        )?);
        check_embedding_dimension(config.embedding.dimension, embedder.as_ref())?;

        let completion: Arc<dyn CompletionProvider> = Arc::new(
            OpenAiCompatClient::new(&config.llm, &config.llm.model)
                .map_err(|e| ReviewLensError::Config(e.to_string()))?,
        );

        let parser_completion: Arc<dyn CompletionProvider> =
            if config.llm.parser_model == config.llm.model {
                completion.clone()
            } else {
                Arc::new(
                    OpenAiCompatClient::new(&config.llm, &config.llm.parser_model)
                        .map_err(|e| ReviewLensError::Config(e.to_string()))?,
                )
            };

        info!(
            store = %config.vector_store.url,
            collection = %config.vector_store.collection,
            model = %config.llm.model,
            parser_model = %config.llm.parser_model,
            "Service context ready"
        );

        Ok(Self::new(config, store, embedder, completion, parser_completion))
    }

    pub fn new(
        config: Config,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        completion: Arc<dyn CompletionProvider>,
        parser_completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            completion,
            parser_completion,
        }
    }
}

/// The model's dense output must match the configured collection dimension
pub fn check_embedding_dimension(expected: usize, embedder: &dyn EmbeddingProvider) -> Result<()> {
    let actual = embedder.dimension();
    if actual != expected {
        return Err(ReviewLensError::InvalidConfigValue {
            path: "embedding.dimension".to_string(),
            message: format!(
                "Model {} produces {}-dimensional vectors, config expects {}",
                embedder.model_name(),
                actual,
                expected
            ),
        });
    }
    Ok(())
}

/// Parsed question and, unless declined, its retrieval plan
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub parsed: ParsedQuery,
    /// `None` for off-topic questions
    pub plan: Option<RetrievalPlan>,
}

pub struct RagEngine {
    context: ServiceContext,
    parser: QueryIntentParser,
    planner: AdaptiveRetrievalPlanner,
    retriever: HybridRetriever,
    synthesizer: AnswerSynthesisStreamer,
}

impl RagEngine {
    pub fn new(context: ServiceContext) -> Result<Self> {
        let config = &context.config;
        let weights = FusionWeights::new(config.retrieval.dense_weight, config.retrieval.sparse_weight)
            .map_err(|e| ReviewLensError::Config(e.to_string()))?;

        Ok(Self {
            parser: QueryIntentParser::new(context.parser_completion.clone(), &config.query),
            planner: AdaptiveRetrievalPlanner::from_config(&config.retrieval),
            retriever: HybridRetriever::new(context.embedder.clone(), context.store.clone(), weights),
            synthesizer: AnswerSynthesisStreamer::new(context.completion.clone(), &config.answer),
            context,
        })
    }

    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    /// Parse the question and build its retrieval plan
    pub async fn prepare(&self, query: &str, today: NaiveDate) -> Result<PreparedQuery> {
        let parsed = self.parser.parse(query, today).await?;

        if parsed.off_topic {
            info!("Question declined as off-topic");
            return Ok(PreparedQuery { parsed, plan: None });
        }

        let filter = FilterTranslator::translate(parsed.filter.as_ref())?;
        let k = self.planner.plan(query);
        debug!(k, filtered = filter.is_some(), "Retrieval planned");

        let plan = RetrievalPlan {
            filter,
            k,
            embedding_text: parsed.embedding_text.clone(),
        };
        Ok(PreparedQuery {
            parsed,
            plan: Some(plan),
        })
    }

    /// Ranked hits without answer generation
    pub async fn search(&self, query: &str, today: NaiveDate) -> Result<(ParsedQuery, Vec<SearchHit>)> {
        let span = request_span(None);
        async move {
            let prepared = self.prepare(query, today).await?;
            let hits = match &prepared.plan {
                Some(plan) => self.retriever.retrieve_plan(plan).await?,
                None => Vec::new(),
            };
            Ok((prepared.parsed, hits))
        }
        .instrument(span)
        .await
    }

    /// Single-shot answer
    pub async fn answer(&self, request: &QueryRequest, today: NaiveDate) -> Result<QueryResponse> {
        let span = request_span(request.session_id.as_deref());
        async move {
            let prepared = self.prepare(&request.query, today).await?;
            let intent = Some(prepared.parsed.intent.as_str().to_string());

            let Some(plan) = prepared.plan else {
                return Ok(QueryResponse {
                    answer: self.context.config.query.decline_message.clone(),
                    context: Vec::new(),
                    intent,
                    parsed_filter: None,
                });
            };

            let context = context_texts(self.retriever.retrieve_plan(&plan).await?);
            let synthesized = self
                .synthesizer
                .synthesize(SynthesisInput {
                    question: &request.query,
                    context: &context,
                    filter: prepared.parsed.filter.as_ref(),
                    history: &request.chat_history,
                })
                .await?;

            Ok(QueryResponse {
                answer: synthesized.answer,
                context: synthesized.context,
                intent,
                parsed_filter: prepared.parsed.filter,
            })
        }
        .instrument(span)
        .await
    }

    /// Streamed answer
    ///
    /// Events arrive on the returned receiver in order and end with exactly
    /// one `end` or `error`. Dropping the receiver cancels the request.
    pub fn answer_stream(
        self: &Arc<Self>,
        request: QueryRequest,
        today: NaiveDate,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let engine = Arc::clone(self);
        let span = request_span(request.session_id.as_deref());

        tokio::spawn(
            async move {
                tokio::select! {
                    _ = engine.run_stream(&request, today, &tx) => {}
                    _ = tx.closed() => debug!("Event consumer disconnected, request cancelled"),
                }
            }
            .instrument(span),
        );

        rx
    }

    async fn run_stream(
        &self,
        request: &QueryRequest,
        today: NaiveDate,
        tx: &mpsc::Sender<StreamEvent>,
    ) {
        let prepared = match self.prepare(&request.query, today).await {
            Ok(prepared) => prepared,
            Err(e) => return send_error(tx, e).await,
        };

        let Some(plan) = prepared.plan else {
            let text = self.context.config.query.decline_message.clone();
            let _ = tx.send(StreamEvent::Done { text }).await;
            return;
        };

        let context = match self.retriever.retrieve_plan(&plan).await {
            Ok(hits) => context_texts(hits),
            Err(e) => return send_error(tx, e).await,
        };

        let outcome = self
            .synthesizer
            .stream(
                SynthesisInput {
                    question: &request.query,
                    context: &context,
                    filter: prepared.parsed.filter.as_ref(),
                    history: &request.chat_history,
                },
                tx,
            )
            .await;
        debug!(?outcome, "Stream finished");
    }
}

fn request_span(session_id: Option<&str>) -> Span {
    info_span!(
        "request",
        id = %Uuid::new_v4(),
        session = session_id.unwrap_or("-")
    )
}

fn context_texts(hits: Vec<SearchHit>) -> Vec<String> {
    hits.into_iter().map(|hit| hit.payload.text).collect()
}

async fn send_error(tx: &mpsc::Sender<StreamEvent>, err: ReviewLensError) {
    error!("Request failed: {}", err);
    let message = err.public_message();
    let _ = tx.send(StreamEvent::Error { message }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingError, QueryEmbedding};
    use async_trait::async_trait;

    struct SizedEmbedder(usize);

    #[async_trait]
    impl EmbeddingProvider for SizedEmbedder {
        async fn embed_query(
            &self,
            _text: &str,
        ) -> std::result::Result<QueryEmbedding, EmbeddingError> {
            Ok(QueryEmbedding {
                dense: vec![0.0; self.0],
                sparse: None,
            })
        }

        fn dimension(&self) -> usize {
            self.0
        }

        fn model_name(&self) -> &str {
            "sized"
        }
    }

    #[test]
    fn test_embedding_dimension_must_match_config() {
        assert!(check_embedding_dimension(768, &SizedEmbedder(768)).is_ok());

        let err = check_embedding_dimension(768, &SizedEmbedder(384)).unwrap_err();
        match err {
            ReviewLensError::InvalidConfigValue { path, message } => {
                assert_eq!(path, "embedding.dimension");
                assert!(message.contains("384"));
            }
            other => panic!("Expected config error, got {:?}", other),
        }
    }
}
