//! Ollama 原生 /api/chat 客户端（支持工具调用）
//!
//! 请求体：system prompt + 对话转换后的 messages + 绑定的 tools，stream=false。
//! Ollama 的 tool_calls 通常不带 id，缺失时生成 `call_<uuid>`。

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::prompt::render_system_prompt;
use crate::llm::traits::{arguments_to_map, tool_name_for};
use crate::llm::{DecisionProvider, LlmError};
use crate::memory::{AssistantTurn, Turn};
use crate::tools::{ToolDefinition, ToolRequest};

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "gpt-oss";

/// Ollama 客户端：持有 HTTP client、模型名、绑定的工具与 prompt 模板
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    tools: Vec<Value>,
    system_template: String,
    time_zone: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl OllamaClient {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        request_timeout_secs: u64,
        tools: &[ToolDefinition],
        system_template: impl Into<String>,
        time_zone: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs.max(1)))
            .build()
            .map_err(|e| LlmError::Unreachable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or(DEFAULT_OLLAMA_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            tools: tools.iter().map(tool_spec).collect(),
            system_template: system_template.into(),
            time_zone: time_zone.into(),
        })
    }

    fn to_ollama_messages(&self, turns: &[Turn]) -> Vec<Value> {
        let system = render_system_prompt(&self.system_template, Utc::now(), &self.time_zone);
        let mut messages = vec![json!({"role": "system", "content": system})];
        for (index, turn) in turns.iter().enumerate() {
            let msg = match turn {
                Turn::User { text } => json!({"role": "user", "content": text}),
                Turn::Assistant(a) => {
                    let mut m = json!({"role": "assistant", "content": a.text});
                    if a.has_tool_requests() {
                        m["tool_calls"] = a
                            .tool_requests
                            .iter()
                            .map(|r| {
                                json!({"function": {"name": r.name, "arguments": r.arguments}})
                            })
                            .collect();
                    }
                    m
                }
                Turn::ToolResult(r) => {
                    let mut m = json!({"role": "tool", "content": r.to_content()});
                    if let Some(name) = tool_name_for(turns, index, &r.request_id) {
                        m["tool_name"] = Value::String(name);
                    }
                    m
                }
            };
            messages.push(msg);
        }
        messages
    }
}

fn tool_spec(def: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": def.input_schema,
        }
    })
}

#[async_trait]
impl DecisionProvider for OllamaClient {
    async fn decide(&self, turns: &[Turn]) -> Result<AssistantTurn, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": self.to_ollama_messages(turns),
            "tools": self.tools,
            "stream": false,
        });
        let resp = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let tool_requests = parsed
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                ToolRequest::new(
                    c.id.filter(|id| !id.is_empty())
                        .unwrap_or_else(ToolRequest::generate_id),
                    c.function.name,
                    arguments_to_map(c.function.arguments),
                )
            })
            .collect();
        Ok(AssistantTurn::with_tool_requests(
            parsed.message.content,
            tool_requests,
        ))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let resp = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::Http {
                status: resp.status().as_u16(),
                body: String::new(),
            })
        }
    }
}
