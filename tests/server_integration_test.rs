//! Integration tests for the HTTP surface

use ark::agents::weather_coordinator;
use ark::bridge::Frame;
use ark::orchestration::{PlanNode, Runner, RunnerConfig};
use ark::server::router;
use ark::session::{InMemorySessionStore, SessionStore};
use ark::testing::ScriptedProvider;
use axum::body::to_bytes;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

fn app(provider: &ScriptedProvider, store: Arc<InMemorySessionStore>) -> axum::Router {
    let root = PlanNode::leaf(weather_coordinator(Arc::new(provider.clone())));
    router(Arc::new(Runner::new(RunnerConfig::default(), root, store)))
}

async fn post(app: axum::Router, uri: &str, body: String) -> (StatusCode, Option<String>, String) {
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(axum::body::Body::from(body))
                .expect("request build should succeed"),
        )
        .await
        .expect("app should handle request");
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("response body should be readable");
    let text = String::from_utf8(body.to_vec()).expect("response body must be utf-8");
    (status, content_type, text)
}

fn parse_sse(body: &str) -> Vec<serde_json::Value> {
    body.split("\n\n")
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            let data = chunk.strip_prefix("data: ").expect("sse data line");
            serde_json::from_str(data).expect("frame must be json")
        })
        .collect()
}

#[tokio::test]
async fn test_send_streams_sse_frames() {
    let provider = ScriptedProvider::new().streamed(&["It is sunny", " in New York."]);
    let store = Arc::new(InMemorySessionStore::new());
    let payload = json!({"mime_type": "text/plain", "data": "Weather in New York?"});

    let (status, content_type, body) = post(
        app(&provider, store.clone()),
        "/send/user_1/session_1",
        payload.to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/event-stream"));
    assert_eq!(
        parse_sse(&body),
        vec![
            json!({"mime_type": "text/plain", "data": "It is sunny"}),
            json!({"mime_type": "text/plain", "data": " in New York."}),
            json!({"turn_complete": true, "interrupted": false}),
        ]
    );
    assert_eq!(
        body,
        format!(
            "{}{}{}",
            Frame::text("It is sunny").to_sse(),
            Frame::text(" in New York.").to_sse(),
            Frame::turn_complete().to_sse()
        )
    );

    let sessions = store.list_sessions("ark", "user_1").await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, "session_1");
}

#[tokio::test]
async fn test_unsupported_mime_type_returns_error_json() {
    let provider = ScriptedProvider::new().text("unused");
    let store = Arc::new(InMemorySessionStore::new());
    let payload = json!({"mime_type": "audio/mp3", "data": ""});

    let (status, content_type, body) = post(
        app(&provider, store.clone()),
        "/send/user_1/session_1",
        payload.to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value, json!({"error": "Mime type not supported: audio/mp3"}));
    assert_eq!(provider.call_count(), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_malformed_body_returns_error_json() {
    let provider = ScriptedProvider::new();
    let store = Arc::new(InMemorySessionStore::new());

    let (status, _, body) = post(
        app(&provider, store),
        "/send/user_1/session_1",
        "{\"data\": \"Hi!\"}".to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(value["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request payload"));
}

#[tokio::test]
async fn test_health() {
    let provider = ScriptedProvider::new();
    let resp = app(&provider, Arc::new(InMemorySessionStore::new()))
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"ok");
}
