//! 任务调度：工具并发池
//!
//! 同一条 assistant turn 里的多个工具请求彼此独立，可以并发执行；
//! 所有会话共享一个 Semaphore，限制同时在跑的工具调用数。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::core::AgentError;

/// 任务调度器（进程级共享）
#[derive(Clone)]
pub struct TaskScheduler {
    /// 工具并发限制（默认 3）
    tool_semaphore: Arc<Semaphore>,
}

impl TaskScheduler {
    pub fn new(max_concurrent_tools: usize) -> Self {
        Self {
            tool_semaphore: Arc::new(Semaphore::new(max_concurrent_tools.max(1))),
        }
    }

    /// 获取工具执行许可；Semaphore 被关闭时视为取消
    pub async fn acquire_tool(&self) -> Result<OwnedSemaphorePermit, AgentError> {
        self.tool_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AgentError::Cancelled)
    }

    /// 当前可用许可数
    pub fn available_permits(&self) -> usize {
        self.tool_semaphore.available_permits()
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let sched = TaskScheduler::new(2);
        let p1 = sched.acquire_tool().await.unwrap();
        let _p2 = sched.acquire_tool().await.unwrap();
        assert_eq!(sched.available_permits(), 0);
        drop(p1);
        assert_eq!(sched.available_permits(), 1);
    }

    #[test]
    fn test_zero_is_clamped_to_one() {
        assert_eq!(TaskScheduler::new(0).available_permits(), 1);
    }
}
