//! Decision Provider 抽象
//!
//! 所有后端（Ollama / OpenAI 兼容 / Mock）实现 DecisionProvider：读完整对话，产出下一条 AssistantTurn。
//! 可用工具在构造时绑定，decide 只接收对话。

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::memory::{AssistantTurn, Turn};
use crate::tools::JsonMap;

/// Provider 层错误；对 run 来说一律是 ProviderUnavailable
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("cannot reach LLM backend: {0}")]
    Unreachable(String),

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("invalid LLM response: {0}")]
    InvalidResponse(String),

    #[error("failed to build LLM request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else {
            LlmError::Unreachable(e.to_string())
        }
    }
}

/// Decision Provider trait
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// 根据完整对话产出下一条 assistant turn
    async fn decide(&self, turns: &[Turn]) -> Result<AssistantTurn, LlmError>;

    /// 模型名（用于 /health）
    fn model_name(&self) -> &str;

    /// 后端可达性探测；默认认为可用
    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

/// 把模型给出的 arguments（对象 / JSON 字符串 / null）统一为 JSON 对象
pub(crate) fn arguments_to_map(raw: Value) -> JsonMap {
    match raw {
        Value::Object(map) => map,
        Value::Null => JsonMap::new(),
        Value::String(s) if s.trim().is_empty() => JsonMap::new(),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => map,
            _ => {
                tracing::warn!(raw = %s, "tool arguments are not a JSON object");
                let mut map = JsonMap::new();
                map.insert("raw_arguments".into(), Value::String(s));
                map
            }
        },
        other => {
            let mut map = JsonMap::new();
            map.insert("value".into(), other);
            map
        }
    }
}

/// 工具结果 turn 没有工具名，按 request_id 从 `index` 之前最近的 assistant turn 找回
pub(crate) fn tool_name_for(turns: &[Turn], index: usize, request_id: &str) -> Option<String> {
    turns[..index.min(turns.len())].iter().rev().find_map(|t| match t {
        Turn::Assistant(a) => a
            .tool_requests
            .iter()
            .find(|r| r.id == request_id)
            .map(|r| r.name.clone()),
        _ => None,
    })
}
