//! Query understanding: intent parsing, filter translation and retrieval planning

mod filter;
mod parser;
mod planner;

pub use filter::{
    iso8601_to_epoch_seconds, FilterSpec, FilterTranslator, RatingFilter, TimeFilter,
    CREATE_TIME_KEY, RATING_KEY,
};
pub use parser::{parse_response, strip_code_fences, Intent, ParsedQuery, QueryIntentParser};
pub use planner::{AdaptiveRetrievalPlanner, DEFAULT_K};
