//! MCP 风格工具接口：列出工具、直接调用工具

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::{JsonMap, ToolRequest, ToolResult};
use crate::web::{ApiError, AppState};

/// 兼容 `{tool_name, arguments}` 与 `{tool, parameters}` 两种写法
#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    #[serde(alias = "tool")]
    pub tool_name: String,
    #[serde(default, alias = "parameters")]
    pub arguments: JsonMap,
}

/// GET /mcp/tools
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "tools": state.components.executor.definitions() }))
}

/// POST /mcp/call：与 Agent 走同一个执行器，工具失败也以 200 + success:false 返回
pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ToolCallRequest>,
) -> Result<Json<ToolResult>, ApiError> {
    if req.tool_name.trim().is_empty() {
        return Err(ApiError::bad_request("tool_name is required"));
    }
    let request = ToolRequest::new(ToolRequest::generate_id(), req.tool_name, req.arguments);
    Ok(Json(state.components.executor.execute(&request).await))
}
