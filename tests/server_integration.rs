mod common;

use chrono::NaiveDate;
use common::*;
use reviewlens::config::Config;
use reviewlens::models::{QueryRequest, QueryResponse, StreamEvent};
use reviewlens::server::{IpcClient, IpcMessage, QueryServer};
use reviewlens::stats::{ReviewStats, StatsPeriod};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

const PARSER_REPLY: &str =
    r#"{"query_embedding_text": "food quality", "intent": "general_question"}"#;

async fn start_server(temp_dir: &TempDir) -> (IpcClient, tokio::task::JoinHandle<()>) {
    let socket_path = temp_dir.path().join("reviewlens.sock");

    let mut config = Config::default();
    config.server.socket_path = socket_path.clone();

    let store = Arc::new(FakeStore::with_hits(vec![
        review(1, 5, "Best tacos in town."),
        review(2, 4, "Fresh salsa, friendly staff."),
    ]));
    let engine = engine_with_config(
        config,
        store,
        Arc::new(CannedParser::new(PARSER_REPLY)),
        Arc::new(ChunkedAnswer::new(&["People praise ", "the tacos. ", "And the salsa."])),
    );

    let server = QueryServer::new(engine);
    let handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            eprintln!("server error: {}", e);
        }
    });

    for _ in 0..50 {
        if socket_path.exists() {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert!(socket_path.exists(), "server socket was not created");

    (IpcClient::new(socket_path), handle)
}

#[tokio::test]
async fn test_server_sync_and_streamed_answers() {
    let temp_dir = TempDir::new().unwrap();
    let (client, handle) = start_server(&temp_dir).await;

    let response = client
        .send(&IpcMessage::Ask {
            request: QueryRequest::new("How is the food?"),
            stream: false,
            date: NaiveDate::from_ymd_opt(2025, 6, 15),
        })
        .await
        .unwrap();
    assert!(response.success);
    let answer: QueryResponse = serde_json::from_value(response.data.unwrap()).unwrap();
    assert_eq!(answer.answer, "People praise the tacos. And the salsa.");
    assert_eq!(answer.context.len(), 2);

    let mut events = Vec::new();
    client
        .ask_stream(QueryRequest::new("How is the food?"), None, |event| {
            events.push(event.clone())
        })
        .await
        .unwrap();

    assert!(matches!(events.first(), Some(StreamEvent::Metadata { .. })));
    assert_eq!(
        events.last(),
        Some(&StreamEvent::Done {
            text: "People praise the tacos. And the salsa.".to_string()
        })
    );

    handle.abort();
}

#[tokio::test]
async fn test_server_status_and_stats() {
    let temp_dir = TempDir::new().unwrap();
    let (client, handle) = start_server(&temp_dir).await;

    let status = client.send(&IpcMessage::Status).await.unwrap();
    assert!(status.success);
    assert_eq!(status.data.unwrap()["status"], "running");

    let response = client.send(&IpcMessage::Stats).await.unwrap();
    assert!(response.success);
    let stats: ReviewStats = serde_json::from_value(response.data.unwrap()).unwrap();
    // The fake store reports its size for every count query
    assert_eq!(stats.count(StatsPeriod::Year, 5), Some(2));
    assert_eq!(stats.total(StatsPeriod::Week), 10);

    handle.abort();
}
