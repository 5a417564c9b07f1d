//! 对话入口：/chat、/chat/stream、/health、/

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::{process_message, process_message_stream};
use crate::core::AgentError;
use crate::react::ReactEvent;
use crate::web::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

fn require_message(req: ChatRequest) -> Result<String, ApiError> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }
    Ok(message)
}

/// POST /chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = require_message(req)?;
    tracing::info!(chars = message.chars().count(), "chat request");
    let response = process_message(&state.components, &message).await?;
    Ok(Json(ChatResponse { response }))
}

/// POST /chat/stream：以 SSE 推送 ReactEvent；客户端断开时取消本次 run
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let message = require_message(req)?;
    let (tx, rx) = mpsc::unbounded_channel::<ReactEvent>();
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let components = Arc::clone(&state.components);
    tokio::spawn(async move {
        match process_message_stream(&components, &message, tx, cancel).await {
            Ok(_) | Err(AgentError::Cancelled) => {}
            Err(e) => tracing::warn!(error = %e, "streamed chat failed"),
        }
    });

    let events = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let ev = rx.recv().await?;
        let data = serde_json::to_string(&ev).unwrap_or_else(|_| "{}".to_string());
        Some((Ok(Event::default().data(data)), (rx, guard)))
    });
    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    ))
}

/// GET /health：Decision Provider 可达性
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let provider = &state.components.provider;
    let model = provider.model_name().to_string();
    match provider.health_check().await {
        Ok(()) => Json(json!({ "status": "ok", "model": model })),
        Err(e) => Json(json!({ "status": "error", "model": model, "error": e.to_string() })),
    }
}

/// GET /
pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": state.name,
        "version": env!("CARGO_PKG_VERSION"),
        "features": ["AI Agent Chat", "Email Notifications", "Google Calendar Sync"],
        "chat_endpoint": "/chat",
        "mcp_tools_endpoint": "/mcp/tools",
        "mcp_call_endpoint": "/mcp/call",
    }))
}
