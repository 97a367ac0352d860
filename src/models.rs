//! Request, response and stream event wire types

use crate::query::FilterSpec;
use serde::{Deserialize, Serialize};

/// One prior exchange in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub human: String,
    pub ai: String,
}

/// Inbound question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, alias = "session_id", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, alias = "chat_history", skip_serializing_if = "Vec::is_empty")]
    pub chat_history: Vec<ChatTurn>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            session_id: None,
            chat_history: Vec::new(),
        }
    }
}

/// Non-streaming answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub context: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default)]
    pub parsed_filter: Option<FilterSpec>,
}

/// Data carried by the metadata event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub context: Vec<String>,
    pub parsed_filter: Option<FilterSpec>,
}

/// Streaming answer event
///
/// Order: `Metadata? -> (Token | Answer)* -> (Done | Error)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Metadata { data: MetadataPayload },
    Token { text: String },
    Answer { text: String },
    /// Terminal; carries the full answer text
    #[serde(rename = "end")]
    Done { text: String },
    /// Terminal; replaces `end`
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
