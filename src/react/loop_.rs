//! ReAct 主循环
//!
//! Decide (LLM) -> Execute (Tools) -> Decide ... 直到模型给出不含工具请求的回复。
//! 显式状态机 + 最大步数限制 + 取消令牌；每个挂起点（模型调用、工具调用）都与取消竞争，
//! 取消时已完成的部分工具结果直接丢弃，不写入对话。
//! 可选 event_tx：向 SSE 等前端推送 StepUpdate / ToolCall / Observation / MessageDone。

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, LoopPhase, TaskScheduler, Termination};
use crate::llm::DecisionProvider;
use crate::memory::{AssistantTurn, Conversation, Turn};
use crate::react::ReactEvent;
use crate::tools::{ToolExecutor, ToolRequest, ToolResult};

/// 默认最大决策轮数
pub const DEFAULT_MAX_ITERATIONS: usize = 25;
/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// ReAct 循环执行结果：最终回复、完整对话、终止原因
#[derive(Debug)]
pub struct ReactResult {
    pub response: String,
    pub turns: Vec<Turn>,
    pub termination: Termination,
    /// 实际调用 Decision Provider 的次数
    pub steps: usize,
}

/// ReAct 会话配置
pub struct ReactSession<'a> {
    pub provider: &'a dyn DecisionProvider,
    pub executor: &'a ToolExecutor,
    pub cancel_token: CancellationToken,
    pub max_iterations: usize,
    /// 可选：工具并发限制
    pub task_scheduler: Option<&'a TaskScheduler>,
    /// 可选：事件推送通道
    pub event_tx: Option<&'a mpsc::UnboundedSender<ReactEvent>>,
}

impl<'a> ReactSession<'a> {
    pub fn new(provider: &'a dyn DecisionProvider, executor: &'a ToolExecutor) -> Self {
        Self {
            provider,
            executor,
            cancel_token: CancellationToken::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            task_scheduler: None,
            event_tx: None,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn with_task_scheduler(mut self, scheduler: &'a TaskScheduler) -> Self {
        self.task_scheduler = Some(scheduler);
        self
    }

    pub fn with_event_tx(mut self, tx: &'a mpsc::UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, ev: ReactEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }
}

/// 执行一次 run：以用户输入为种子，循环到 Terminated
pub async fn react_loop(
    session: &ReactSession<'_>,
    user_input: &str,
) -> Result<ReactResult, AgentError> {
    let mut conversation = Conversation::seeded(user_input);
    let mut phase = LoopPhase::Deciding;
    let mut step = 0;
    let max_steps = session.max_iterations.max(1);

    loop {
        if phase != LoopPhase::Terminated && session.cancel_token.is_cancelled() {
            session.send_event(ReactEvent::Error {
                text: "Cancelled".to_string(),
            });
            return Err(AgentError::Cancelled);
        }

        let next = match phase {
            LoopPhase::Deciding => {
                if step >= max_steps {
                    return Ok(iteration_limit(session, conversation, step, max_steps));
                }
                session.send_event(ReactEvent::StepUpdate { step, max_steps });
                session.send_event(ReactEvent::Thinking);

                let turn = decide(session, &conversation).await?;
                step += 1;
                session.send_event(ReactEvent::AssistantTurn {
                    text: turn.text.clone(),
                    tool_requests: turn.tool_requests.len(),
                });
                let next = if turn.has_tool_requests() {
                    LoopPhase::ExecutingTools
                } else {
                    LoopPhase::Terminated
                };
                conversation.append(Turn::Assistant(turn));
                next
            }
            LoopPhase::ExecutingTools => {
                let requests: Vec<ToolRequest> = conversation
                    .pending_requests()
                    .into_iter()
                    .cloned()
                    .collect();
                let results = execute_all(session, &requests).await?;
                for result in results {
                    conversation.append(Turn::ToolResult(result));
                }
                debug_assert!(conversation.pending_requests().is_empty());
                LoopPhase::Deciding
            }
            LoopPhase::Terminated => {
                let response = match conversation.last()? {
                    Turn::Assistant(a) => a.text.clone(),
                    _ => String::new(),
                };
                tracing::debug!(steps = step, "react loop completed");
                session.send_event(ReactEvent::MessageDone {
                    text: response.clone(),
                    termination: Termination::Completed,
                });
                return Ok(ReactResult {
                    response,
                    turns: conversation.into_turns(),
                    termination: Termination::Completed,
                    steps: step,
                });
            }
        };
        debug_assert!(phase.can_transition_to(next));
        phase = next;
    }
}

/// Decision 挂起点：与取消竞争；Provider 失败对 run 致命
async fn decide(
    session: &ReactSession<'_>,
    conversation: &Conversation,
) -> Result<AssistantTurn, AgentError> {
    let outcome = tokio::select! {
        biased;
        _ = session.cancel_token.cancelled() => return Err(AgentError::Cancelled),
        r = session.provider.decide(conversation.turns()) => r,
    };
    outcome.map_err(|e| {
        tracing::warn!(error = %e, "decision provider failed");
        session.send_event(ReactEvent::Error {
            text: e.to_string(),
        });
        AgentError::from(e)
    })
}

/// Execution 挂起点：同一 turn 的工具彼此独立，并发执行；结果按请求顺序返回
async fn execute_all(
    session: &ReactSession<'_>,
    requests: &[ToolRequest],
) -> Result<Vec<ToolResult>, AgentError> {
    let calls = requests.iter().map(|request| async move {
        let _permit = match session.task_scheduler {
            Some(sched) => Some(sched.acquire_tool().await?),
            None => None,
        };
        session.send_event(ReactEvent::ToolCall {
            id: request.id.clone(),
            tool: request.name.clone(),
            args: serde_json::Value::Object(request.arguments.clone()),
        });
        let result = session.executor.execute(request).await;
        match &result.error {
            Some(reason) if !result.success => session.send_event(ReactEvent::ToolFailure {
                id: request.id.clone(),
                tool: request.name.clone(),
                reason: reason.clone(),
            }),
            _ => session.send_event(ReactEvent::Observation {
                id: request.id.clone(),
                tool: request.name.clone(),
                preview: preview(&result.to_content()),
            }),
        }
        Ok::<ToolResult, AgentError>(result)
    });

    tokio::select! {
        biased;
        _ = session.cancel_token.cancelled() => Err(AgentError::Cancelled),
        results = join_all(calls) => results.into_iter().collect(),
    }
}

/// 达到步数上限：追加一条合成回复并终止
fn iteration_limit(
    session: &ReactSession<'_>,
    mut conversation: Conversation,
    step: usize,
    max_steps: usize,
) -> ReactResult {
    let text = format!(
        "Exceeded maximum tool-call iterations ({max_steps}). Stopped before the assistant produced a final answer."
    );
    tracing::warn!(max_steps, "react loop hit iteration limit");
    conversation.append(Turn::Assistant(AssistantTurn::final_answer(text.clone())));
    session.send_event(ReactEvent::MessageDone {
        text: text.clone(),
        termination: Termination::IterationLimitExceeded,
    });
    ReactResult {
        response: text,
        turns: conversation.into_turns(),
        termination: Termination::IterationLimitExceeded,
        steps: step,
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!(
            "{}...",
            s.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>()
        )
    } else {
        s.to_string()
    }
}
