//! ReAct 循环集成测试

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use calbee::agent::{run_message, AgentComponents};
    use calbee::calendar::{CalendarService, EventStore};
    use calbee::config::AppConfig;
    use calbee::core::{AgentError, TaskScheduler, Termination};
    use calbee::integrations::{DisabledGoogleCalendar, LogNotifier};
    use calbee::llm::{DecisionProvider, MockDecisionProvider, MockStep};
    use calbee::memory::{AssistantTurn, Turn};
    use calbee::react::{react_loop, ReactEvent, ReactSession};
    use calbee::tools::{
        JsonMap, ToolDefinition, ToolError, ToolExecutor, ToolHandler, ToolRegistry, ToolRequest,
    };
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn args(v: Value) -> JsonMap {
        v.as_object().cloned().unwrap_or_default()
    }

    fn request(id: &str, name: &str, v: Value) -> ToolRequest {
        ToolRequest::new(id, name, args(v))
    }

    fn calendar() -> Arc<CalendarService> {
        Arc::new(CalendarService::new(
            Arc::new(EventStore::new()),
            Arc::new(DisabledGoogleCalendar),
            Arc::new(LogNotifier),
            chrono_tz::America::Chicago,
        ))
    }

    fn components(mock: Arc<MockDecisionProvider>, max_iterations: usize) -> AgentComponents {
        let mut cfg = AppConfig::default();
        cfg.agent.max_iterations = max_iterations;
        let provider: Arc<dyn DecisionProvider> = mock;
        AgentComponents::new(provider, calendar(), &cfg).unwrap()
    }

    /// 每个 assistant turn 之后紧跟的 ToolResult 数量与请求数一致，且 request_id 一一对应、顺序一致
    fn assert_paired(turns: &[Turn]) {
        let mut i = 0;
        while i < turns.len() {
            if let Turn::Assistant(a) = &turns[i] {
                for (k, req) in a.tool_requests.iter().enumerate() {
                    match turns.get(i + 1 + k) {
                        Some(Turn::ToolResult(r)) => assert_eq!(r.request_id, req.id),
                        other => panic!("missing result for {}: {:?}", req.id, other),
                    }
                }
                let next = i + 1 + a.tool_requests.len();
                if let Some(Turn::ToolResult(r)) = turns.get(next) {
                    panic!("orphaned tool result {}", r.request_id);
                }
                i = next;
            } else {
                i += 1;
            }
        }
    }

    /// 按参数 delay_ms 睡眠后返回，并记录完成顺序
    struct SleepTool {
        finished: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ToolHandler for SleepTool {
        async fn handle(&self, args: JsonMap) -> Result<JsonMap, ToolError> {
            let label = args
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let delay = args.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.finished.lock().unwrap().push(label.clone());
            Ok(args_map(json!({ "success": true, "label": label })))
        }
    }

    fn args_map(v: Value) -> JsonMap {
        args(v)
    }

    fn sleep_executor() -> (ToolExecutor, Arc<Mutex<Vec<String>>>) {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDefinition {
                    name: "sleep".into(),
                    description: "sleep then return".into(),
                    input_schema: json!({"type": "object", "properties": {}}),
                },
                Arc::new(SleepTool {
                    finished: finished.clone(),
                }),
            )
            .unwrap();
        (ToolExecutor::new(Arc::new(registry), 10), finished)
    }

    #[tokio::test]
    async fn test_meeting_scenario() {
        let mock = Arc::new(MockDecisionProvider::with_script([
            MockStep::Reply(AssistantTurn::with_tool_requests(
                "",
                vec![request(
                    "call_1",
                    "create_calendar_event_tool",
                    json!({
                        "title": "Meeting",
                        "start_time": "2025-01-02T15:00:00Z",
                        "end_time": "2025-01-02T16:00:00Z"
                    }),
                )],
            )),
            MockStep::Reply(AssistantTurn::final_answer(
                "Scheduled your meeting for 3pm tomorrow.",
            )),
        ]));
        let comps = components(mock.clone(), 25);

        let result = run_message(
            &comps,
            "Schedule a meeting tomorrow at 3pm for 1 hour",
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.response, "Scheduled your meeting for 3pm tomorrow.");
        assert_eq!(result.termination, Termination::Completed);
        assert_eq!(result.steps, 2);
        assert_eq!(result.turns.len(), 4);
        assert_paired(&result.turns);
        match &result.turns[2] {
            Turn::ToolResult(r) => {
                assert!(r.success, "{:?}", r.error);
                assert_eq!(r.payload["event"]["title"], "Meeting");
            }
            other => panic!("expected tool result, got {other:?}"),
        }

        // 第二次 decide 能看到工具结果
        let seen = mock.seen_turns();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].len(), 3);

        let events = comps.calendar.list(None, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Meeting");
    }

    #[tokio::test]
    async fn test_results_follow_request_order_not_completion_order() {
        let (executor, finished) = sleep_executor();
        let provider = MockDecisionProvider::with_script([
            MockStep::Reply(AssistantTurn::with_tool_requests(
                "",
                vec![
                    request("req1", "sleep", json!({"label": "slow", "delay_ms": 150})),
                    request("req2", "sleep", json!({"label": "fast", "delay_ms": 0})),
                ],
            )),
            MockStep::Reply(AssistantTurn::final_answer("done")),
        ]);
        let session = ReactSession::new(&provider, &executor);

        let result = react_loop(&session, "go").await.unwrap();
        assert_paired(&result.turns);
        let ids: Vec<_> = result
            .turns
            .iter()
            .filter_map(|t| match t {
                Turn::ToolResult(r) => Some(r.request_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, ["req1", "req2"]);
        // 两个工具并发执行，快的先完成
        assert_eq!(*finished.lock().unwrap(), ["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_scheduler_limits_tool_concurrency() {
        let (executor, finished) = sleep_executor();
        let scheduler = TaskScheduler::new(1);
        let provider = MockDecisionProvider::with_script([
            MockStep::Reply(AssistantTurn::with_tool_requests(
                "",
                vec![
                    request("req1", "sleep", json!({"label": "slow", "delay_ms": 80})),
                    request("req2", "sleep", json!({"label": "fast", "delay_ms": 0})),
                ],
            )),
            MockStep::Reply(AssistantTurn::final_answer("done")),
        ]);
        let session = ReactSession::new(&provider, &executor).with_task_scheduler(&scheduler);

        let result = react_loop(&session, "go").await.unwrap();
        assert_paired(&result.turns);
        // 只有一个许可时按请求顺序串行
        assert_eq!(*finished.lock().unwrap(), ["slow", "fast"]);
        assert_eq!(scheduler.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_end_run() {
        let mock = Arc::new(MockDecisionProvider::with_script([
            MockStep::Reply(AssistantTurn::with_tool_requests(
                "",
                vec![request("c1", "teleport_tool", json!({}))],
            )),
            MockStep::Reply(AssistantTurn::final_answer("Sorry, I can't do that.")),
        ]));
        let comps = components(mock.clone(), 25);

        let result = run_message(&comps, "beam me up", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.termination, Termination::Completed);
        assert_eq!(result.response, "Sorry, I can't do that.");
        assert_eq!(mock.calls(), 2);
        match &result.turns[2] {
            Turn::ToolResult(r) => {
                assert!(!r.success);
                assert_eq!(r.error.as_deref(), Some("Unknown tool 'teleport_tool'"));
            }
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let mock = Arc::new(MockDecisionProvider::always_request(
            "calendar_get_today_events",
            JsonMap::new(),
        ));
        let comps = components(mock.clone(), 3);

        let result = run_message(&comps, "loop forever", CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.termination, Termination::IterationLimitExceeded);
        assert_eq!(mock.calls(), 3);
        assert_eq!(result.steps, 3);
        assert!(result
            .response
            .contains("Exceeded maximum tool-call iterations (3)"));
        assert_paired(&result.turns);
        // 3 轮 × (assistant + result) + user + 合成回复
        assert_eq!(result.turns.len(), 8);
        assert!(matches!(
            result.turns.last(),
            Some(Turn::Assistant(a)) if !a.has_tool_requests()
        ));
    }

    #[tokio::test]
    async fn test_provider_unavailable_is_fatal() {
        let mock = Arc::new(MockDecisionProvider::with_script([MockStep::Unavailable(
            "connection refused".into(),
        )]));
        let comps = components(mock, 25);
        let err = run_message(&comps, "hi", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_provider_failure_after_tools_is_fatal() {
        let mock = Arc::new(MockDecisionProvider::with_script([
            MockStep::Reply(AssistantTurn::with_tool_requests(
                "",
                vec![request("c1", "calendar_get_events", json!({}))],
            )),
            MockStep::Unavailable("model crashed".into()),
        ]));
        let comps = components(mock.clone(), 25);
        let err = run_message(&comps, "list", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ProviderUnavailable(_)));
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancel_during_decision() {
        let mock = Arc::new(MockDecisionProvider::with_script([MockStep::Delayed(
            Duration::from_secs(10),
            AssistantTurn::final_answer("too late"),
        )]));
        let comps = components(mock, 25);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(2), run_message(&comps, "hi", token))
            .await
            .expect("cancellation should end the run promptly");
        assert!(matches!(outcome, Err(AgentError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_during_tool_execution() {
        let (executor, finished) = sleep_executor();
        let provider = MockDecisionProvider::with_script([MockStep::Reply(
            AssistantTurn::with_tool_requests(
                "",
                vec![request("c1", "sleep", json!({"label": "long", "delay_ms": 5000}))],
            ),
        )]);
        let token = CancellationToken::new();
        let session = ReactSession::new(&provider, &executor).with_cancel_token(token.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(2), react_loop(&session, "go"))
            .await
            .expect("cancellation should end the run promptly");
        assert!(matches!(outcome, Err(AgentError::Cancelled)));
        assert!(finished.lock().unwrap().is_empty());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_calls_provider() {
        let mock = Arc::new(MockDecisionProvider::new());
        let comps = components(mock.clone(), 25);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            run_message(&comps, "hi", token).await,
            Err(AgentError::Cancelled)
        ));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_events_are_streamed() {
        let (executor, _) = sleep_executor();
        let provider = MockDecisionProvider::with_script([
            MockStep::Reply(AssistantTurn::with_tool_requests(
                "checking",
                vec![
                    request("a", "sleep", json!({"label": "a"})),
                    request("b", "missing_tool", json!({})),
                ],
            )),
            MockStep::Reply(AssistantTurn::final_answer("all done")),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = ReactSession::new(&provider, &executor).with_event_tx(&tx);
        react_loop(&session, "go").await.unwrap();
        drop(session);
        drop(tx);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert!(matches!(events.first(), Some(ReactEvent::StepUpdate { step: 0, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ReactEvent::Observation { id, .. } if id == "a")));
        assert!(events
            .iter()
            .any(|e| matches!(e, ReactEvent::ToolFailure { id, .. } if id == "b")));
        match events.last() {
            Some(ReactEvent::MessageDone { text, termination }) => {
                assert_eq!(text, "all done");
                assert_eq!(*termination, Termination::Completed);
            }
            other => panic!("expected MessageDone, got {other:?}"),
        }
    }
}
