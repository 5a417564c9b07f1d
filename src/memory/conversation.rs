//! 短期记忆：单次 run 的对话记录
//!
//! 只追加、不修改、不删除。每次 /chat 调用新建一份，run 结束即丢弃，run 之间不共享。

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::tools::{ToolRequest, ToolResult};

/// 模型产出的一条回复：文本 + 零个或多个工具请求
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantTurn {
    pub text: String,
    #[serde(default)]
    pub tool_requests: Vec<ToolRequest>,
}

impl AssistantTurn {
    /// 不含工具请求的最终回复
    pub fn final_answer(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_requests: Vec::new(),
        }
    }

    pub fn with_tool_requests(text: impl Into<String>, tool_requests: Vec<ToolRequest>) -> Self {
        Self {
            text: text.into(),
            tool_requests,
        }
    }

    pub fn has_tool_requests(&self) -> bool {
        !self.tool_requests.is_empty()
    }
}

/// 对话中的一条记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User { text: String },
    Assistant(AssistantTurn),
    ToolResult(ToolResult),
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::User { text: text.into() }
    }
}

/// 只追加的对话记录
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// 以一条用户消息开始一次 run
    pub fn seeded(user_text: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(user_text)],
        }
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Result<&Turn, AgentError> {
        self.turns.last().ok_or(AgentError::EmptyConversation)
    }

    /// 最近一条 assistant turn 中尚未有结果的工具请求（按请求顺序）
    pub fn pending_requests(&self) -> Vec<&ToolRequest> {
        let Some(pos) = self
            .turns
            .iter()
            .rposition(|t| matches!(t, Turn::Assistant(_)))
        else {
            return Vec::new();
        };
        let Turn::Assistant(assistant) = &self.turns[pos] else {
            return Vec::new();
        };
        let answered: Vec<&str> = self.turns[pos + 1..]
            .iter()
            .filter_map(|t| match t {
                Turn::ToolResult(r) => Some(r.request_id.as_str()),
                _ => None,
            })
            .collect();
        assistant
            .tool_requests
            .iter()
            .filter(|r| !answered.contains(&r.id.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::JsonMap;

    #[test]
    fn test_last_on_empty_conversation() {
        let conv = Conversation::default();
        assert!(matches!(conv.last(), Err(AgentError::EmptyConversation)));
    }

    #[test]
    fn test_seeded_conversation() {
        let conv = Conversation::seeded("hi");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.last().unwrap(), &Turn::user("hi"));
    }

    #[test]
    fn test_pending_requests_shrink_as_results_arrive() {
        let mut conv = Conversation::seeded("two things");
        conv.append(Turn::Assistant(AssistantTurn::with_tool_requests(
            "",
            vec![
                ToolRequest::new("a", "calendar_get_events", JsonMap::new()),
                ToolRequest::new("b", "calendar_get_today_events", JsonMap::new()),
            ],
        )));
        assert_eq!(conv.pending_requests().len(), 2);
        conv.append(Turn::ToolResult(ToolResult::ok("a", JsonMap::new())));
        let pending: Vec<_> = conv.pending_requests().iter().map(|r| r.id.clone()).collect();
        assert_eq!(pending, vec!["b"]);
        conv.append(Turn::ToolResult(ToolResult::ok("b", JsonMap::new())));
        assert!(conv.pending_requests().is_empty());
    }

    #[test]
    fn test_turn_serializes_with_role_tag() {
        let v = serde_json::to_value(Turn::user("hello")).unwrap();
        assert_eq!(v["role"], "user");
        assert_eq!(v["text"], "hello");
    }
}
