//! Mock Decision Provider（用于测试与本地演示，无需模型服务）
//!
//! 按脚本依次返回预设的 AssistantTurn；脚本耗尽后回显最后一条用户消息作为最终回复。
//! `always_request` 模式下每轮都请求同一个工具，用于验证步数上限。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{DecisionProvider, LlmError};
use crate::memory::{AssistantTurn, Turn};
use crate::tools::{JsonMap, ToolRequest};

/// 脚本中的一步
#[derive(Clone, Debug)]
pub enum MockStep {
    Reply(AssistantTurn),
    /// 模拟后端不可达
    Unavailable(String),
    /// 先等待再回复（用于取消测试）
    Delayed(Duration, AssistantTurn),
}

/// Mock 客户端
#[derive(Default)]
pub struct MockDecisionProvider {
    script: Mutex<VecDeque<MockStep>>,
    repeat: Option<(String, JsonMap)>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Turn>>>,
}

impl MockDecisionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(steps: impl IntoIterator<Item = MockStep>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    /// 每轮都请求同一个工具，永不结束
    pub fn always_request(name: impl Into<String>, args: JsonMap) -> Self {
        Self {
            repeat: Some((name.into(), args)),
            ..Self::default()
        }
    }

    pub fn push(&self, step: MockStep) -> &Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
        self
    }

    /// decide 被调用的次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次 decide 时看到的对话快照
    pub fn seen_turns(&self) -> Vec<Vec<Turn>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn next_step(&self, turns: &[Turn]) -> MockStep {
        if let Some((name, args)) = &self.repeat {
            return MockStep::Reply(AssistantTurn::with_tool_requests(
                "",
                vec![ToolRequest::new(
                    ToolRequest::generate_id(),
                    name.clone(),
                    args.clone(),
                )],
            ));
        }
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        scripted.unwrap_or_else(|| {
            let last_user = turns
                .iter()
                .rev()
                .find_map(|t| match t {
                    Turn::User { text } => Some(text.as_str()),
                    _ => None,
                })
                .unwrap_or("(no input)");
            MockStep::Reply(AssistantTurn::final_answer(format!(
                "Echo from Mock: {last_user}"
            )))
        })
    }
}

#[async_trait]
impl DecisionProvider for MockDecisionProvider {
    async fn decide(&self, turns: &[Turn]) -> Result<AssistantTurn, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(turns.to_vec());
        }
        match self.next_step(turns) {
            MockStep::Reply(turn) => Ok(turn),
            MockStep::Unavailable(reason) => Err(LlmError::Unreachable(reason)),
            MockStep::Delayed(delay, turn) => {
                tokio::time::sleep(delay).await;
                Ok(turn)
            }
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_echo() {
        let mock = MockDecisionProvider::with_script([MockStep::Reply(
            AssistantTurn::final_answer("scripted"),
        )]);
        let turns = [Turn::user("hello")];
        assert_eq!(mock.decide(&turns).await.unwrap().text, "scripted");
        assert_eq!(
            mock.decide(&turns).await.unwrap().text,
            "Echo from Mock: hello"
        );
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_step() {
        let mock = MockDecisionProvider::with_script([MockStep::Unavailable("down".into())]);
        assert!(mock.decide(&[Turn::user("x")]).await.is_err());
    }
}
