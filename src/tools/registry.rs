//! 工具注册表
//!
//! 所有工具实现 ToolHandler（handle(args) -> payload），由 ToolRegistry 按名注册与查找。
//! 启动时填充一次，之后只读，以 Arc 在所有会话间共享，读取无需加锁。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::AgentError;
use crate::tools::{JsonMap, ToolDefinition};

/// 工具处理函数返回的错误；由执行器转为 ToolResult{success:false}
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::InvalidArguments(e.to_string())
    }
}

/// 工具处理 trait：参数为已归一化的 JSON 对象，返回 JSON 对象载荷
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: JsonMap) -> Result<JsonMap, ToolError>;
}

struct Entry {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// 工具注册表：保留注册顺序，供 /mcp/tools 与 LLM 绑定工具时使用
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名重复注册返回 DuplicateTool
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), AgentError> {
        if self.index.contains_key(&definition.name) {
            return Err(AgentError::DuplicateTool(definition.name));
        }
        self.index.insert(definition.name.clone(), self.entries.len());
        self.entries.push(Entry { definition, handler });
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ToolHandler>, AgentError> {
        self.index
            .get(name)
            .map(|&i| self.entries[i].handler.clone())
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 按注册顺序返回全部定义
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.entries.iter().map(|e| e.definition.clone()).collect()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.definition.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
