//! Query intent parser
//!
//! Asks the parser model to turn a free-form question into embedding text,
//! a filter spec, an intent label and an off-topic flag. The current date is
//! always supplied by the caller so relative phrases resolve reproducibly.

use super::filter::FilterSpec;
use crate::config::QueryConfig;
use crate::error::{Result, ReviewLensError};
use crate::llm::CompletionProvider;
use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// Coarse intent label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    SummarizeReviews,
    ListPros,
    ListCons,
    GeneralQuestion,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::SummarizeReviews => "summarize_reviews",
            Intent::ListPros => "list_pros",
            Intent::ListCons => "list_cons",
            Intent::GeneralQuestion => "general_question",
        }
    }

    /// Unknown labels fall back to the default intent
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "list_pros" => Intent::ListPros,
            "list_cons" => Intent::ListCons,
            "general_question" => Intent::GeneralQuestion,
            _ => Intent::SummarizeReviews,
        }
    }
}

/// Structured reading of one question; immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedQuery {
    pub embedding_text: String,
    pub filter: Option<FilterSpec>,
    pub intent: Intent,
    pub off_topic: bool,
}

#[derive(Deserialize)]
struct RawParsedQuery {
    #[serde(default)]
    query_embedding_text: Option<String>,
    #[serde(default)]
    filter: Option<Value>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    off_topic: Option<bool>,
}

const PROMPT_TEMPLATE: &str = r#"Today's date is: {current_date}.
You are a query parser for customer reviews of a single business. The user is the business owner.

First decide whether the query is about customer reviews, customer feedback or the business's operations.
If it is NOT (weather, sports, politics, general knowledge, ...), return:
{"off_topic": true, "query_embedding_text": "<the query>", "filter": {}}

Otherwise extract:
- query_embedding_text: the main text to embed for semantic search
- filter: rating and createTime conditions
- intent: one of "summarize_reviews", "list_pros", "list_cons", "general_question"

Reviews have these fields:
- text: review text
- rating: star rating (integer 1-5)
- createTime: creation date (ISO-8601)

Rules:
- createTime bounds are ISO-8601 with a trailing Z, e.g. "2025-01-01T00:00:00Z".
- Relative time phrases without an explicit period ("over time", "lately", "increased", "decreased") mean createTime {"$gte": "{relative_floor}"}.
- Explicit periods ("last year", "since March") resolve against today's date.
- Complaints, negative feedback or cons mean rating {"$in": {complaint_ratings}} unless the user gives a different range.
- Ratings are always integers 1-5.

Return ONLY a JSON object matching:
{
  "off_topic"?: boolean,
  "query_embedding_text": string,
  "filter"?: {
    "rating"?: {"$in"?: number[], "$gte"?: number, "$lte"?: number},
    "createTime"?: {"$gte"?: string}
  },
  "intent": "summarize_reviews" | "list_pros" | "list_cons" | "general_question"
}

User query: "{user_query}"
"#;

/// Remove a surrounding markdown code fence (with optional language tag)
pub fn strip_code_fences(text: &str) -> &str {
    static OPEN: OnceLock<Regex> = OnceLock::new();
    static CLOSE: OnceLock<Regex> = OnceLock::new();

    let open = OPEN.get_or_init(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").unwrap());
    let close = CLOSE.get_or_init(|| Regex::new(r"\r?\n?```$").unwrap());

    let mut text = text.trim();
    if let Some(m) = open.find(text) {
        text = text[m.end()..].trim_start();
    }
    if let Some(m) = close.find(text) {
        text = text[..m.start()].trim_end();
    }
    text
}

pub struct QueryIntentParser {
    completion: Arc<dyn CompletionProvider>,
    lookback_days: u32,
    complaint_ratings: Vec<i64>,
}

impl QueryIntentParser {
    pub fn new(completion: Arc<dyn CompletionProvider>, config: &QueryConfig) -> Self {
        Self {
            completion,
            lookback_days: config.relative_time_lookback_days,
            complaint_ratings: config.complaint_ratings.clone(),
        }
    }

    /// Absolute lower bound used for open-ended relative time phrases
    pub fn relative_time_floor(&self, today: NaiveDate) -> String {
        let floor = today - Duration::days(i64::from(self.lookback_days));
        format!("{}T00:00:00Z", floor.format("%Y-%m-%d"))
    }

    /// Render the parser instruction for a query
    pub fn build_prompt(&self, query: &str, today: NaiveDate) -> String {
        let ratings = serde_json::to_string(&self.complaint_ratings)
            .unwrap_or_else(|_| "[1, 2]".to_string());

        PROMPT_TEMPLATE
            .replace("{current_date}", &today.format("%Y-%m-%d").to_string())
            .replace("{relative_floor}", &self.relative_time_floor(today))
            .replace("{complaint_ratings}", &ratings)
            .replace("{user_query}", &query.replace('"', "'"))
    }

    /// Parse a question relative to `today`
    pub async fn parse(&self, query: &str, today: NaiveDate) -> Result<ParsedQuery> {
        let prompt = self.build_prompt(query, today);
        let response = self.completion.complete(&prompt).await?;
        let parsed = parse_response(&response, query)?;

        tracing::debug!(
            intent = parsed.intent.as_str(),
            off_topic = parsed.off_topic,
            has_filter = parsed.filter.is_some(),
            "Parsed query"
        );

        Ok(parsed)
    }
}

/// Decode the parser model's reply
///
/// Invalid JSON is a `Parse` error carrying the raw text; a filter that is
/// JSON but not a filter spec is a `FilterTranslation` error.
pub fn parse_response(response: &str, original_query: &str) -> Result<ParsedQuery> {
    let content = strip_code_fences(response);

    let value: Value = serde_json::from_str(content).map_err(|e| ReviewLensError::Parse {
        message: e.to_string(),
        raw: content.to_string(),
    })?;

    let raw: RawParsedQuery =
        serde_json::from_value(value).map_err(|e| ReviewLensError::Parse {
            message: format!("unexpected shape: {}", e),
            raw: content.to_string(),
        })?;

    let filter = match raw.filter {
        None | Some(Value::Null) => None,
        Some(value) => {
            let spec: FilterSpec = serde_json::from_value(value).map_err(|e| {
                ReviewLensError::FilterTranslation(format!("malformed filter: {}", e))
            })?;
            Some(spec).filter(|s| !s.is_empty())
        }
    };

    let embedding_text = match raw.query_embedding_text {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            tracing::warn!("Parser returned no embedding text, using the raw query");
            original_query.to_string()
        }
    };

    Ok(ParsedQuery {
        embedding_text,
        filter,
        intent: raw
            .intent
            .as_deref()
            .map(Intent::from_label)
            .unwrap_or_default(),
        off_topic: raw.off_topic.unwrap_or(false),
    })
}
