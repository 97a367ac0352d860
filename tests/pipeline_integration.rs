//! End-to-end request pipeline against in-memory collaborators

mod common;

use chrono::NaiveDate;
use common::*;
use reviewlens::answer::NO_REVIEWS_MESSAGE;
use reviewlens::config::Config;
use reviewlens::models::{QueryRequest, StreamEvent};
use reviewlens::store::{Condition, StoreFilter};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const COMPLAINTS_REPLY: &str = r#"```json
{"query_embedding_text": "complaints about service", "filter": {"rating": {"$in": [1, 2]}}, "intent": "list_cons"}
```"#;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn complaint_store() -> Arc<FakeStore> {
    Arc::new(FakeStore::with_hits(vec![
        review(1, 1, "Waited forty minutes for cold soup."),
        review(2, 2, "Staff ignored us all evening."),
    ]))
}

#[tokio::test]
async fn test_sync_answer_carries_filter_and_context() {
    let store = complaint_store();
    let answer = Arc::new(ChunkedAnswer::new(&["Guests mention ", "slow and cold food."]));
    let engine = engine_with(store.clone(), Arc::new(CannedParser::new(COMPLAINTS_REPLY)), answer.clone());

    let response = engine
        .answer(&QueryRequest::new("What do customers complain about?"), today())
        .await
        .unwrap();

    assert_eq!(response.answer, "Guests mention slow and cold food.");
    assert_eq!(response.context.len(), 2);
    assert_eq!(response.intent.as_deref(), Some("list_cons"));
    assert!(response.parsed_filter.is_some());

    let filters = store.filters.lock().unwrap();
    assert_eq!(
        filters[0],
        Some(StoreFilter {
            must: vec![Condition::match_any("rating", vec![1, 2])]
        })
    );

    let prompts = answer.prompts.lock().unwrap();
    assert!(prompts[0].contains("Waited forty minutes for cold soup."));
}

#[tokio::test]
async fn test_stream_event_order() {
    let engine = engine_with(
        complaint_store(),
        Arc::new(CannedParser::new(COMPLAINTS_REPLY)),
        Arc::new(ChunkedAnswer::new(&[
            "Most complaints ",
            "are about wait times. ",
            "A few mention ",
            "rude staff.",
        ])),
    );

    let events = drain(engine.answer_stream(QueryRequest::new("What do customers complain about?"), today())).await;

    match &events[0] {
        StreamEvent::Metadata { data } => {
            assert_eq!(data.context.len(), 2);
            assert!(data.parsed_filter.is_some());
        }
        other => panic!("Expected metadata first, got {:?}", other),
    }

    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    assert!(events.last().unwrap().is_terminal());

    let tokens: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Token { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        events.last().unwrap(),
        &StreamEvent::Done {
            text: "Most complaints are about wait times. A few mention rude staff.".to_string()
        }
    );
    assert_eq!(tokens, "Most complaints are about wait times. A few mention rude staff.");
}

#[tokio::test]
async fn test_no_hits_yields_single_end_event() {
    let store = Arc::new(FakeStore::default());
    let engine = engine_with(
        store,
        Arc::new(CannedParser::new(COMPLAINTS_REPLY)),
        Arc::new(ChunkedAnswer::new(&["never used"])),
    );

    let events = drain(engine.answer_stream(QueryRequest::new("Any complaints?"), today())).await;
    assert_eq!(
        events,
        vec![StreamEvent::Done {
            text: NO_REVIEWS_MESSAGE.to_string()
        }]
    );

    let response = engine
        .answer(&QueryRequest::new("Any complaints?"), today())
        .await
        .unwrap();
    assert_eq!(response.answer, NO_REVIEWS_MESSAGE);
    assert!(response.context.is_empty());
}

#[tokio::test]
async fn test_count_question_states_number() {
    let hits = (1..=7).map(|i| review(i, 1, "Terrible.")).collect();
    let store = Arc::new(FakeStore::with_hits(hits));
    let answer = Arc::new(ChunkedAnswer::new(&["Most cite long waits."]));
    let engine = engine_with(
        store,
        Arc::new(CannedParser::new(
            r#"{"query_embedding_text": "one star reviews", "filter": {"rating": {"$in": [1]}}, "intent": "summarize_reviews"}"#,
        )),
        answer.clone(),
    );

    let response = engine
        .answer(&QueryRequest::new("How many 1-star reviews are there?"), today())
        .await
        .unwrap();

    assert!(response
        .answer
        .starts_with("Based on the provided reviews, there are 7 reviews that match your criteria."));
    assert_eq!(response.context.len(), 7);
    assert!(answer.prompts.lock().unwrap()[0].contains("Number of matching reviews: 7"));
}

#[tokio::test]
async fn test_off_topic_question_is_declined_without_search() {
    let store = complaint_store();
    let engine = engine_with(
        store.clone(),
        Arc::new(CannedParser::new(
            r#"{"off_topic": true, "query_embedding_text": "weather", "filter": {}}"#,
        )),
        Arc::new(ChunkedAnswer::new(&["never used"])),
    );
    let decline = Config::default().query.decline_message;

    let response = engine
        .answer(&QueryRequest::new("Will it rain tomorrow?"), today())
        .await
        .unwrap();
    assert_eq!(response.answer, decline);
    assert!(response.context.is_empty());

    let events = drain(engine.answer_stream(QueryRequest::new("Will it rain tomorrow?"), today())).await;
    assert_eq!(events, vec![StreamEvent::Done { text: decline }]);

    assert_eq!(store.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unparseable_parser_output_becomes_error_event() {
    let store = complaint_store();
    let engine = engine_with(
        store.clone(),
        Arc::new(CannedParser::new("I think you want complaints!")),
        Arc::new(ChunkedAnswer::new(&["never used"])),
    );

    let events = drain(engine.answer_stream(QueryRequest::new("complaints?"), today())).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], StreamEvent::Error { .. }));
    assert_eq!(store.searches.load(Ordering::SeqCst), 0);

    let result = engine.answer(&QueryRequest::new("complaints?"), today()).await;
    assert!(matches!(
        result,
        Err(reviewlens::ReviewLensError::Parse { .. })
    ));
}

#[tokio::test]
async fn test_bad_rating_filter_is_rejected() {
    let engine = engine_with(
        complaint_store(),
        Arc::new(CannedParser::new(
            r#"{"query_embedding_text": "x", "filter": {"rating": {"$in": [0, 9]}}}"#,
        )),
        Arc::new(ChunkedAnswer::new(&["never used"])),
    );

    let result = engine.answer(&QueryRequest::new("zero star reviews"), today()).await;
    assert!(matches!(
        result,
        Err(reviewlens::ReviewLensError::FilterTranslation(_))
    ));
}

#[tokio::test]
async fn test_dropping_receiver_stops_generation() {
    let answer = Arc::new(EndlessAnswer::default());
    let engine = engine_with(
        complaint_store(),
        Arc::new(CannedParser::new(COMPLAINTS_REPLY)),
        answer.clone(),
    );

    let mut rx = engine.answer_stream(QueryRequest::new("What do customers complain about?"), today());
    assert!(matches!(rx.recv().await, Some(StreamEvent::Metadata { .. })));
    assert!(matches!(rx.recv().await, Some(StreamEvent::Token { .. })));
    drop(rx);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(answer.dropped.load(Ordering::SeqCst));

    let produced = answer.produced.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(answer.produced.load(Ordering::SeqCst), produced);
}
