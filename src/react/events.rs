//! ReAct 过程事件：用于 SSE 流式展示思考、工具调用、观察与最终回复

use serde::Serialize;

use crate::core::Termination;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 进入第几轮决策
    StepUpdate { step: usize, max_steps: usize },
    /// 正在调用 LLM
    Thinking,
    /// 模型本轮回复的文本与请求的工具数
    AssistantTurn { text: String, tool_requests: usize },
    ToolCall {
        id: String,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation {
        id: String,
        tool: String,
        preview: String,
    },
    ToolFailure {
        id: String,
        tool: String,
        reason: String,
    },
    /// 最终回复
    MessageDone {
        text: String,
        termination: Termination,
    },
    Error { text: String },
}
