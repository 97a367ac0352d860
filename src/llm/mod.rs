//! Completion collaborator
//!
//! Callers get a [`Completion`] that says up front whether the answer arrived
//! whole or as incremental chunks; nothing downstream probes response shapes.

mod openai;
mod sse;

pub use openai::OpenAiCompatClient;
pub use sse::SseDecoder;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Completion request failed: {0}")]
    Request(String),

    #[error("Completion API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid completion response: {0}")]
    InvalidResponse(String),

    #[error("Completion stream interrupted: {0}")]
    Stream(String),

    #[error("Missing API key: environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Incremental text output of a streaming completion
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// Output of a completion call, decided once by the adapter
pub enum Completion {
    /// The whole answer in one unit
    FullText(String),
    /// Text increments in emission order
    ChunkStream(TextStream),
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Completion::FullText(text) => f.debug_tuple("FullText").field(text).finish(),
            Completion::ChunkStream(_) => f.write_str("ChunkStream(..)"),
        }
    }
}

/// Completion collaborator. Shared across requests; must be safe for concurrent use.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Single-shot completion
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Completion that may arrive incrementally
    async fn stream(&self, prompt: &str) -> Result<Completion, LlmError>;

    fn model_name(&self) -> &str;
}
