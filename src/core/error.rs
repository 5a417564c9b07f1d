//! Agent 错误类型
//!
//! 只有 Provider、配置与取消类错误会逃出 ReAct 循环；工具层错误一律折叠为 ToolResult 写回对话。

use thiserror::Error;

use crate::llm::LlmError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// Decision Provider 不可达或返回了无法解析的响应，对本次 run 致命
    #[error("LLM provider unavailable: {0}")]
    ProviderUnavailable(#[from] LlmError),

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool '{0}' timed out")]
    ToolTimeout(String),

    /// 对空对话调用 last()，属于编程错误
    #[error("Conversation has no turns yet")]
    EmptyConversation,

    /// 同名工具重复注册，属于启动配置错误
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    /// 是否应以 503 暴露给调用方
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AgentError::ProviderUnavailable(_))
    }
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::Config(e.to_string())
    }
}
