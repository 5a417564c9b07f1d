//! HTTP 服务：对话、MCP 工具接口、日程 REST
//!
//! 所有路由共享一份 AgentComponents；每次 /chat 调用是独立的 run。

pub mod chat;
pub mod error;
pub mod events;
pub mod mcp;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

use crate::agent::AgentComponents;
use crate::config::AppSection;

/// 路由共享状态
pub struct AppState {
    pub components: Arc<AgentComponents>,
    pub name: String,
}

impl AppState {
    pub fn new(components: Arc<AgentComponents>, app: &AppSection) -> Self {
        Self {
            components,
            name: app
                .name
                .clone()
                .unwrap_or_else(|| "Calendar Agent".to_string()),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 创建完整路由
pub fn create_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(chat::root))
        .route("/health", get(chat::health))
        .route("/chat", post(chat::chat))
        .route("/chat/stream", post(chat::chat_stream))
        .route("/mcp/tools", get(mcp::list_tools))
        .route("/mcp/call", post(mcp::call_tool))
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/today/list", get(events::today_events))
        .route("/events/import-google", get(events::import_google))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/reminder", post(events::send_reminder))
        .route("/events/:id/sync-google", post(events::sync_google))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
