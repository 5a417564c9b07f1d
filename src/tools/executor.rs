//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时。execute(request) 依次做：代理调用展开、参数归一化、别名解析、
//! 超时内调用 handler，并把任何失败（含 handler panic）折叠为 ToolResult{success:false}，从不让工具错误终止会话。
//! 每次调用输出结构化审计日志（JSON）。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::alias::{normalize_arguments, resolve_alias, unwrap_proxy_call};
use crate::tools::{JsonMap, ToolDefinition, ToolRegistry, ToolRequest, ToolResult};

/// 工具执行器：无状态，只负责委派
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 执行一次工具请求；永远返回 ToolResult
    pub async fn execute(&self, request: &ToolRequest) -> ToolResult {
        let start = Instant::now();
        let (target, args) = unwrap_proxy_call(&request.name, request.arguments.clone());
        let args = normalize_arguments(args);
        let canonical = resolve_alias(&target).to_string();
        let args_preview = args_preview(&args);

        let result = match self.invoke(&canonical, args).await {
            Ok(payload) => wrap_payload(&request.id, payload),
            Err(AgentError::UnknownTool(_)) => {
                ToolResult::failed(&request.id, AgentError::UnknownTool(target).to_string())
            }
            Err(e) => ToolResult::failed(&request.id, e.to_string()),
        };

        let outcome = match &result.error {
            None => "ok",
            Some(_) if !self.registry.contains(&canonical) => "unknown_tool",
            Some(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": canonical,
            "requested_as": request.name,
            "request_id": request.id,
            "ok": result.success,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        result
    }

    async fn invoke(&self, name: &str, args: JsonMap) -> Result<JsonMap, AgentError> {
        let handler = self.registry.resolve(name)?;
        let call = AssertUnwindSafe(handler.handle(args)).catch_unwind();
        match timeout(self.timeout, call).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(e))) => Err(AgentError::ToolExecutionFailed(e.to_string())),
            Ok(Err(panic)) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(tool = %name, reason = %reason, "tool handler panicked");
                Err(AgentError::ToolExecutionFailed(format!("tool panicked: {reason}")))
            }
            Err(_) => Err(AgentError::ToolTimeout(name.to_string())),
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.list()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }
}

/// handler 自己返回 `{"success": false, ...}` 时也视为失败
fn wrap_payload(request_id: &str, payload: JsonMap) -> ToolResult {
    if let Some(Value::Bool(false)) = payload.get("success") {
        let error = ["error", "message"]
            .iter()
            .find_map(|k| payload.get(*k).and_then(Value::as_str))
            .unwrap_or("Tool reported failure")
            .to_string();
        return ToolResult {
            request_id: request_id.to_string(),
            success: false,
            payload,
            error: Some(error),
        };
    }
    ToolResult::ok(request_id, payload)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn args_preview(args: &JsonMap) -> String {
    let s = Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolError, ToolHandler};
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn handle(&self, args: JsonMap) -> Result<JsonMap, ToolError> {
            let mut out = JsonMap::new();
            out.insert("success".into(), json!(true));
            out.insert("echo".into(), Value::Object(args));
            Ok(out)
        }
    }

    struct Broken;

    #[async_trait]
    impl ToolHandler for Broken {
        async fn handle(&self, _args: JsonMap) -> Result<JsonMap, ToolError> {
            Err(ToolError::Failed("smtp connection refused".into()))
        }
    }

    struct Slow;

    #[async_trait]
    impl ToolHandler for Slow {
        async fn handle(&self, _args: JsonMap) -> Result<JsonMap, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(JsonMap::new())
        }
    }

    struct SoftFailure;

    #[async_trait]
    impl ToolHandler for SoftFailure {
        async fn handle(&self, _args: JsonMap) -> Result<JsonMap, ToolError> {
            Ok(json!({"success": false, "message": "Failed to sync with Google Calendar"})
                .as_object()
                .cloned()
                .unwrap())
        }
    }

    struct Panicky;

    #[async_trait]
    impl ToolHandler for Panicky {
        async fn handle(&self, _args: JsonMap) -> Result<JsonMap, ToolError> {
            panic!("window overflowed");
        }
    }

    fn def(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: String::new(),
            input_schema: json!({"type": "object"}),
        }
    }

    fn executor() -> ToolExecutor {
        let mut reg = ToolRegistry::new();
        reg.register(def("calendar_create_event"), Arc::new(Echo)).unwrap();
        reg.register(def("calendar_send_reminder"), Arc::new(Broken)).unwrap();
        reg.register(def("calendar_import_google"), Arc::new(Slow)).unwrap();
        reg.register(def("calendar_sync_google"), Arc::new(SoftFailure)).unwrap();
        reg.register(def("calendar_get_today_events"), Arc::new(Panicky)).unwrap();
        ToolExecutor::new(Arc::new(reg), 30).with_timeout(Duration::from_millis(50))
    }

    fn request(name: &str, args: Value) -> ToolRequest {
        ToolRequest::new("req-1", name, args.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_alias_with_wrapped_kwargs() {
        let exec = executor();
        let req = request(
            "create_calendar_event_tool",
            json!({"kwargs": {"title": "Meeting"}}),
        );
        let result = exec.execute(&req).await;
        assert!(result.success);
        assert_eq!(result.request_id, "req-1");
        assert_eq!(result.payload["echo"], json!({"title": "Meeting"}));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_failed_result() {
        let result = executor().execute(&request("teleport_tool", json!({}))).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown tool 'teleport_tool'"));
    }

    #[tokio::test]
    async fn test_handler_error_is_captured() {
        let result = executor()
            .execute(&request("calendar_send_reminder", json!({})))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("smtp connection refused"));
    }

    #[tokio::test]
    async fn test_timeout_is_captured() {
        let result = executor()
            .execute(&request("calendar_import_google", json!({})))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_soft_failure_payload() {
        let result = executor()
            .execute(&request("sync_google_calendar_tool", json!({"event_id": "x"})))
            .await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Failed to sync with Google Calendar")
        );
        assert_eq!(result.payload["success"], json!(false));
    }

    #[tokio::test]
    async fn test_handler_panic_is_a_failed_result() {
        let result = executor()
            .execute(&request("get_today_events_tool", json!({})))
            .await;
        assert!(!result.success);
        assert_eq!(result.request_id, "req-1");
        assert!(result.error.unwrap().contains("tool panicked: window overflowed"));
    }

    #[tokio::test]
    async fn test_proxy_envelope() {
        let req = request(
            "mcp_calendar_tool",
            json!({"tool_name": "create_calendar_event_tool", "kwargs": {"title": "Sync"}}),
        );
        let result = executor().execute(&req).await;
        assert!(result.success);
        assert_eq!(result.payload["echo"], json!({"title": "Sync"}));
    }
}
