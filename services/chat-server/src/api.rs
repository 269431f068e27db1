//! JSON API handlers: chat, strategies and the connectivity probe

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::AppState;
use crate::metrics::record_chat_request;
use crate::strategies;

/// JSON response with an explicit content type.
pub fn reply(status: StatusCode, body: serde_json::Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

fn timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
}

/// `POST /api/chat`
pub async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    handle_chat(&state, body, request_id).await
}

/// Validate the message and hand it to the chat facade.
///
/// Only malformed or empty input is rejected here; once a message reaches
/// the facade the reply is always 200, carrying either generated text or
/// the fallback answer.
#[instrument(skip_all, fields(request_id = %request_id))]
async fn handle_chat(state: &AppState, body: Bytes, request_id: String) -> Response {
    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    let message = match serde_json::from_slice::<ChatRequest>(&body) {
        Ok(req) => req.message.unwrap_or_default(),
        Err(e) => {
            state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "chat body is not valid JSON");
            record_chat_request(400, started.elapsed().as_secs_f64());
            return reply(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"success": false, "message": "Invalid JSON data"}),
            );
        }
    };

    let message = message.trim();
    if message.is_empty() {
        warn!("empty chat message");
        record_chat_request(400, started.elapsed().as_secs_f64());
        return reply(
            StatusCode::BAD_REQUEST,
            serde_json::json!({"success": false, "message": "Message cannot be empty"}),
        );
    }

    info!(message_chars = message.chars().count(), "processing chat message");
    let bot_response = state.chat.get_response(message).await;

    let elapsed = started.elapsed();
    record_chat_request(200, elapsed.as_secs_f64());
    info!(duration_ms = elapsed.as_millis() as u64, "chat answered");

    reply(
        StatusCode::OK,
        serde_json::json!({
            "success": true,
            "message": "Message processed",
            "bot_response": bot_response,
            "timestamp": timestamp(),
        }),
    )
}

/// `GET /api/test`
pub async fn test_handler() -> Response {
    reply(
        StatusCode::OK,
        serde_json::json!({
            "success": true,
            "message": "Server is running correctly",
            "timestamp": timestamp(),
            "endpoints_available": [
                "/contact - POST (contact form)",
                "/api/chat - POST (chat)",
                "/api/test - GET (probe)",
                "/api/strategies - GET (strategies)",
            ],
        }),
    )
}

/// `GET /api/strategies`
pub async fn strategies_handler() -> Response {
    let strategies = strategies::catalog();
    reply(
        StatusCode::OK,
        serde_json::json!({
            "success": true,
            "count": strategies.len(),
            "strategies": strategies,
        }),
    )
}
