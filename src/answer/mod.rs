//! Answer synthesis over retrieved review text
//!
//! Produces either a single answer or an ordered event sequence:
//! one `metadata` event, then `token`/`answer` events, then exactly one of
//! `end` or `error`.

mod batcher;
mod prompt;

pub use batcher::TokenBatcher;
pub use prompt::{build_answer_prompt, count_sentence, is_count_question, PromptInput};

use crate::config::AnswerConfig;
use crate::error::{Result, ReviewLensError};
use crate::llm::{Completion, CompletionProvider, LlmError};
use crate::models::{ChatTurn, MetadataPayload, StreamEvent};
use crate::query::FilterSpec;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Answer returned when retrieval found nothing usable
pub const NO_REVIEWS_MESSAGE: &str = "There are no reviews matching your query.";

/// Everything the synthesizer needs for one question
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub question: &'a str,
    pub context: &'a [String],
    pub filter: Option<&'a FilterSpec>,
    pub history: &'a [ChatTurn],
}

impl SynthesisInput<'_> {
    fn has_context(&self) -> bool {
        self.context.iter().any(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAnswer {
    pub answer: String,
    pub context: Vec<String>,
}

/// How a streaming run ended
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// `end` was delivered with this text
    Completed(String),
    /// `error` was delivered
    Failed,
    /// The consumer went away; production stopped
    Cancelled,
}

pub struct AnswerSynthesisStreamer {
    completion: Arc<dyn CompletionProvider>,
    min_token_chars: usize,
    max_history_turns: usize,
}

impl AnswerSynthesisStreamer {
    pub fn new(completion: Arc<dyn CompletionProvider>, config: &AnswerConfig) -> Self {
        Self {
            completion,
            min_token_chars: config.min_token_chars,
            max_history_turns: config.max_history_turns,
        }
    }

    fn prompt_for(&self, input: &SynthesisInput<'_>, lead: Option<&str>) -> String {
        build_answer_prompt(
            &PromptInput {
                question: input.question,
                context: input.context,
                filter: input.filter,
                review_count: input.context.len(),
                history: input.history,
            },
            lead,
            self.max_history_turns,
        )
    }

    fn count_lead(input: &SynthesisInput<'_>) -> Option<String> {
        is_count_question(input.question).then(|| count_sentence(input.context.len()))
    }

    /// Single-shot answer
    pub async fn synthesize(&self, input: SynthesisInput<'_>) -> Result<SynthesizedAnswer> {
        if !input.has_context() {
            debug!("No usable context, skipping generation");
            return Ok(SynthesizedAnswer {
                answer: NO_REVIEWS_MESSAGE.to_string(),
                context: Vec::new(),
            });
        }

        let lead = Self::count_lead(&input);
        let prompt = self.prompt_for(&input, lead.as_deref());
        let text = self.completion.complete(&prompt).await.map_err(|e| {
            error!("Answer generation failed: {}", e);
            ReviewLensError::from(e)
        })?;

        let answer = match lead {
            Some(lead) => format!("{} {}", lead, text.trim()),
            None => text.trim().to_string(),
        };

        info!(
            context = input.context.len(),
            chars = answer.len(),
            "Answer synthesized"
        );

        Ok(SynthesizedAnswer {
            answer,
            context: input.context.to_vec(),
        })
    }

    /// Streamed answer delivered through `tx`
    ///
    /// Stops as soon as the receiving side is dropped; the completion stream
    /// is dropped with it, which ends token production upstream.
    pub async fn stream(
        &self,
        input: SynthesisInput<'_>,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> StreamOutcome {
        if !input.has_context() {
            let text = NO_REVIEWS_MESSAGE.to_string();
            return match tx.send(StreamEvent::Done { text: text.clone() }).await {
                Ok(()) => StreamOutcome::Completed(text),
                Err(_) => StreamOutcome::Cancelled,
            };
        }

        let metadata = StreamEvent::Metadata {
            data: MetadataPayload {
                context: input.context.to_vec(),
                parsed_filter: input.filter.cloned(),
            },
        };
        if tx.send(metadata).await.is_err() {
            return StreamOutcome::Cancelled;
        }

        let lead = Self::count_lead(&input);
        let prompt = self.prompt_for(&input, lead.as_deref());
        let mut full = lead.map(|lead| format!("{} ", lead)).unwrap_or_default();

        let completion = tokio::select! {
            result = self.completion.stream(&prompt) => result,
            _ = tx.closed() => return StreamOutcome::Cancelled,
        };

        let completion = match completion {
            Ok(completion) => completion,
            Err(e) => return fail(tx, e).await,
        };

        match completion {
            Completion::FullText(text) => {
                // One unit: the count sentence travels inside the answer
                full.push_str(&text);
                if tx.send(StreamEvent::Answer { text: full.clone() }).await.is_err() {
                    return StreamOutcome::Cancelled;
                }
            }
            Completion::ChunkStream(mut chunks) => {
                if !full.is_empty()
                    && tx
                        .send(StreamEvent::Token { text: full.clone() })
                        .await
                        .is_err()
                {
                    return StreamOutcome::Cancelled;
                }
                let mut batcher = TokenBatcher::new(self.min_token_chars);
                loop {
                    let next = tokio::select! {
                        next = chunks.next() => next,
                        _ = tx.closed() => return StreamOutcome::Cancelled,
                    };
                    let batch = match next {
                        Some(Ok(chunk)) => batcher.push(&chunk),
                        Some(Err(e)) => return fail(tx, e).await,
                        None => break,
                    };
                    if let Some(text) = batch {
                        full.push_str(&text);
                        if tx.send(StreamEvent::Token { text }).await.is_err() {
                            return StreamOutcome::Cancelled;
                        }
                    }
                }
                if let Some(text) = batcher.finish() {
                    full.push_str(&text);
                    if tx.send(StreamEvent::Token { text }).await.is_err() {
                        return StreamOutcome::Cancelled;
                    }
                }
            }
        }

        info!(
            context = input.context.len(),
            chars = full.len(),
            "Streamed answer complete"
        );

        match tx.send(StreamEvent::Done { text: full.clone() }).await {
            Ok(()) => StreamOutcome::Completed(full),
            Err(_) => StreamOutcome::Cancelled,
        }
    }
}

async fn fail(tx: &mpsc::Sender<StreamEvent>, err: LlmError) -> StreamOutcome {
    error!("Answer stream failed: {}", err);
    let message = ReviewLensError::from(err).public_message();
    match tx.send(StreamEvent::Error { message }).await {
        Ok(()) => StreamOutcome::Failed,
        Err(_) => StreamOutcome::Cancelled,
    }
}
