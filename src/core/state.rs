//! 循环状态定义
//!
//! ReAct 循环是显式状态机：Deciding -> ExecutingTools -> Deciding ... -> Terminated。
//! Termination 记录终止原因，达到步数上限不是错误而是一种终止方式。

use serde::Serialize;

/// 循环阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    /// 等待 Decision Provider 产出下一条 assistant turn
    Deciding,
    /// 执行最近一条 assistant turn 请求的全部工具
    ExecutingTools,
    Terminated,
}

/// 终止原因
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// 模型给出了不含工具请求的最终回复
    Completed,
    /// 达到 max_iterations，追加了合成的说明回复
    IterationLimitExceeded,
}

impl LoopPhase {
    /// 合法的状态转移；用于在循环内做断言
    pub fn can_transition_to(self, next: LoopPhase) -> bool {
        matches!(
            (self, next),
            (LoopPhase::Deciding, LoopPhase::ExecutingTools)
                | (LoopPhase::Deciding, LoopPhase::Terminated)
                | (LoopPhase::ExecutingTools, LoopPhase::Deciding)
                | (LoopPhase::ExecutingTools, LoopPhase::Terminated)
        )
    }
}
