//! OpenAI 兼容 /chat/completions 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 OpenAI、DeepSeek、
//! Ollama 的 /v1 兼容端点以及自建代理。

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::llm::prompt::render_system_prompt;
use crate::llm::traits::arguments_to_map;
use crate::llm::{DecisionProvider, LlmError};
use crate::memory::{AssistantTurn, Turn};
use crate::tools::{ToolDefinition, ToolRequest};

impl From<OpenAIError> for LlmError {
    fn from(e: OpenAIError) -> Self {
        match e {
            OpenAIError::Reqwest(e) => LlmError::Unreachable(e.to_string()),
            other => LlmError::InvalidResponse(other.to_string()),
        }
    }
}

/// OpenAI 兼容客户端：持有 Client、model 名与绑定的工具
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
    /// function tool 的线上 JSON，请求时转为 async_openai 的工具类型
    tools: Vec<Value>,
    system_template: String,
    time_zone: String,
}

impl OpenAiClient {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: Option<&str>,
        request_timeout_secs: u64,
        tools: &[ToolDefinition],
        system_template: impl Into<String>,
        time_zone: impl Into<String>,
    ) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = match base_url {
            Some(url) => OpenAIConfig::new()
                .with_api_base(url.trim_end_matches('/'))
                .with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
            tools: tools
                .iter()
                .map(|d| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": d.name,
                            "description": d.description,
                            "parameters": d.input_schema,
                        }
                    })
                })
                .collect(),
            system_template: system_template.into(),
            time_zone: time_zone.into(),
        }
    }

    fn to_openai_messages(&self, turns: &[Turn]) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let system = render_system_prompt(&self.system_template, Utc::now(), &self.time_zone);
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()?
                .into(),
        ];
        for turn in turns {
            let message: ChatCompletionRequestMessage = match turn {
                Turn::User { text } => ChatCompletionRequestUserMessageArgs::default()
                    .content(text.clone())
                    .build()?
                    .into(),
                Turn::Assistant(a) if a.has_tool_requests() => assistant_with_tool_calls(a)?,
                Turn::Assistant(a) => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(a.text.clone())
                    .build()?
                    .into(),
                Turn::ToolResult(r) => ChatCompletionRequestToolMessageArgs::default()
                    .content(r.to_content())
                    .tool_call_id(r.request_id.clone())
                    .build()?
                    .into(),
            };
            messages.push(message);
        }
        Ok(messages)
    }
}

/// 带 tool_calls 的 assistant 消息：按 OpenAI 线上格式构造后反序列化
fn assistant_with_tool_calls(turn: &AssistantTurn) -> Result<ChatCompletionRequestMessage, LlmError> {
    let tool_calls: Vec<Value> = turn
        .tool_requests
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "type": "function",
                "function": {
                    "name": r.name,
                    "arguments": Value::Object(r.arguments.clone()).to_string(),
                },
            })
        })
        .collect();
    let content = if turn.text.is_empty() {
        Value::Null
    } else {
        Value::String(turn.text.clone())
    };
    serde_json::from_value(json!({
        "role": "assistant",
        "content": content,
        "tool_calls": tool_calls,
    }))
    .map_err(|e| LlmError::Request(e.to_string()))
}

/// 响应里的 tool call 按线上格式读取 id / function.name / function.arguments
fn tool_request_from_call<T: Serialize>(call: &T) -> Result<ToolRequest, LlmError> {
    let wire = serde_json::to_value(call).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    let name = wire
        .pointer("/function/name")
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::InvalidResponse(format!("tool call without function name: {wire}")))?;
    let id = wire
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .unwrap_or_else(ToolRequest::generate_id);
    let arguments = wire
        .pointer("/function/arguments")
        .cloned()
        .unwrap_or(Value::Null);
    Ok(ToolRequest::new(id, name, arguments_to_map(arguments)))
}

#[async_trait]
impl DecisionProvider for OpenAiClient {
    async fn decide(&self, turns: &[Turn]) -> Result<AssistantTurn, LlmError> {
        let mut request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(self.to_openai_messages(turns)?)
            .build()?;
        if !self.tools.is_empty() {
            request.tools = Some(
                serde_json::from_value(Value::Array(self.tools.clone()))
                    .map_err(|e| LlmError::Request(e.to_string()))?,
            );
        }

        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout)??;

        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".into()))?
            .message;

        let tool_requests = message
            .tool_calls
            .unwrap_or_default()
            .iter()
            .map(tool_request_from_call)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AssistantTurn::with_tool_requests(
            message.content.unwrap_or_default(),
            tool_requests,
        ))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
