//! HTTP surface for client turns.
//!
//! `POST /send/{user_id}/{session_id}` takes `{mime_type, data}` and answers
//! with a `text/event-stream` of bridge frames. Protocol errors are answered
//! synchronously with `{"error": ...}` and no stream is opened.

use crate::bridge::{ClientRequest, FrameStream, ProtocolError};
use crate::orchestration::Runner;
use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SEND_PATH: &str = "/send/{user_id}/{session_id}";
pub const HEALTH_PATH: &str = "/health";

/// Build the router serving `runner`
pub fn router(runner: Arc<Runner>) -> Router {
    Router::new()
        .route(SEND_PATH, post(send))
        .route(HEALTH_PATH, get(health))
        .with_state(runner)
}

/// Bind `addr` and serve until the process ends
pub async fn serve(runner: Arc<Runner>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, app = runner.app_name(), "Listening");
    axum::serve(listener, router(runner))
        .await
        .context("HTTP server failed")
}

async fn send(
    State(runner): State<Arc<Runner>>,
    Path((user_id, session_id)): Path<(String, String)>,
    body: Result<Json<ClientRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let err = ProtocolError::InvalidPayload(rejection.body_text());
            return protocol_error(&err);
        }
    };

    debug!(user_id = %user_id, session_id = %session_id, mime_type = %request.mime_type, "Client turn");
    match runner.send(&user_id, &session_id, request) {
        Ok(frames) => sse_response(frames),
        Err(err) => protocol_error(&err),
    }
}

async fn health() -> &'static str {
    "ok"
}

fn protocol_error(err: &ProtocolError) -> Response {
    warn!(error = %err, "Rejected client request");
    (StatusCode::BAD_REQUEST, Json(err.to_response())).into_response()
}

/// Encode frames as server-sent events
pub fn sse_response(frames: FrameStream) -> Response {
    let stream = frames.map(|frame| Ok::<_, Infallible>(frame.to_sse()));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    (headers, Body::from_stream(stream)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{frames, Frame};
    use crate::orchestration::Event;
    use axum::body::to_bytes;
    use futures_util::stream;

    #[tokio::test]
    async fn test_sse_response_encoding() {
        let events = vec![
            Event::text("e-1", "agent", "Hello", true),
            Event::text("e-1", "agent", "Hello", false),
        ];
        let response = sse_response(frames(stream::iter(events)));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        let expected = format!(
            "{}{}",
            Frame::text("Hello").to_sse(),
            Frame::turn_complete().to_sse()
        );
        assert_eq!(body, expected);
    }

    #[tokio::test]
    async fn test_protocol_error_response() {
        let response = protocol_error(&ProtocolError::UnsupportedMimeType("audio/mp3".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Mime type not supported: audio/mp3");
    }
}
