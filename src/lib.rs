//! ReviewLens - question answering over customer reviews
//!
//! Parses a business owner's question into a rating/date filter and an
//! intent, retrieves matching reviews from a vector store with hybrid
//! dense/sparse search, and synthesizes an answer from them, either in one
//! piece or as an ordered stream of events.

pub mod answer;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod llm;
pub mod models;
pub mod query;
pub mod retrieval;
pub mod server;
pub mod stats;
pub mod store;

pub use error::{Result, ReviewLensError};
