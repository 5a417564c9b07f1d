//! Headless Agent 运行时
//!
//! 供 HTTP API 调用的无界面 Agent 逻辑：
//! create_agent_components 按配置构建日历服务、工具执行器与 Decision Provider，
//! process_message 对单条用户输入跑一次 ReAct 并返回最终回复；每次调用都是独立的 run，
//! 不在调用之间保留对话。

use std::sync::Arc;

use chrono_tz::Tz;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::calendar::{register_calendar_tools, CalendarCapability, CalendarService, EventStore};
use crate::config::AppConfig;
use crate::core::{AgentError, TaskScheduler};
use crate::integrations::{
    DisabledGoogleCalendar, GoogleCalendar, GoogleCalendarClient, LogNotifier, Notifier,
    SmtpNotifier, TokenStore,
};
use crate::llm::{create_provider_from_config, DecisionProvider};
use crate::react::{react_loop, ReactEvent, ReactResult, ReactSession};
use crate::tools::{ToolDefinition, ToolExecutor, ToolRegistry};

/// 预构建的 Agent 组件，可在所有请求间共享
pub struct AgentComponents {
    pub provider: Arc<dyn DecisionProvider>,
    pub executor: ToolExecutor,
    pub calendar: Arc<CalendarService>,
    /// 工具并发限制
    pub task_scheduler: TaskScheduler,
    pub max_iterations: usize,
}

impl AgentComponents {
    /// 用给定的 provider 与日历服务组装（测试时注入 Mock）
    pub fn new(
        provider: Arc<dyn DecisionProvider>,
        calendar: Arc<CalendarService>,
        cfg: &AppConfig,
    ) -> Result<Self, AgentError> {
        let mut registry = ToolRegistry::new();
        register_calendar_tools(&mut registry, calendar.clone())?;
        Ok(Self {
            provider,
            executor: ToolExecutor::new(Arc::new(registry), cfg.tools.tool_timeout_secs),
            calendar,
            task_scheduler: TaskScheduler::new(cfg.agent.max_concurrent_tools),
            max_iterations: cfg.agent.max_iterations,
        })
    }

    fn session(&self) -> ReactSession<'_> {
        ReactSession::new(self.provider.as_ref(), &self.executor)
            .with_max_iterations(self.max_iterations)
            .with_task_scheduler(&self.task_scheduler)
    }
}

/// 解析 [google].time_zone
pub fn parse_time_zone(name: &str) -> Result<Tz, AgentError> {
    name.parse::<Tz>()
        .map_err(|e| AgentError::Config(format!("invalid time zone '{name}': {e}")))
}

/// 按配置构建日历服务：未启用 Google 时使用占位实现，未配置 SMTP 时只记日志
pub fn build_calendar_service(cfg: &AppConfig) -> Result<CalendarService, AgentError> {
    let tz = parse_time_zone(&cfg.google.time_zone)?;
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| AgentError::Config(format!("http client: {e}")))?;

    let google: Arc<dyn GoogleCalendar> = if cfg.google.enabled {
        let tokens = Arc::new(TokenStore::new(cfg.google.token_path.clone(), http.clone()));
        if !tokens.path().exists() {
            tracing::warn!(
                path = %tokens.path().display(),
                "Google token file not found; run calbee-oauth before syncing"
            );
        }
        Arc::new(GoogleCalendarClient::new(
            http,
            tokens,
            cfg.google.calendar_id.clone(),
            tz,
        ))
    } else {
        Arc::new(DisabledGoogleCalendar)
    };

    let notifier: Arc<dyn Notifier> = if cfg.email.is_configured() {
        match SmtpNotifier::from_config(&cfg.email, tz) {
            Ok(n) => Arc::new(n),
            Err(e) => {
                tracing::warn!(error = %e, "SMTP notifier unavailable, emails will only be logged");
                Arc::new(LogNotifier)
            }
        }
    } else {
        tracing::info!("email credentials not configured, emails will only be logged");
        Arc::new(LogNotifier)
    };

    Ok(CalendarService::new(
        Arc::new(EventStore::new()),
        google,
        notifier,
        tz,
    ))
}

/// 创建 Agent 组件：日历服务、工具、Decision Provider
pub fn create_agent_components(cfg: &AppConfig) -> Result<AgentComponents, AgentError> {
    let calendar = Arc::new(build_calendar_service(cfg)?);
    let definitions: Vec<ToolDefinition> = CalendarCapability::ALL
        .iter()
        .map(|c| c.definition())
        .collect();
    let provider = create_provider_from_config(cfg, &definitions)?;
    AgentComponents::new(provider, calendar, cfg)
}

/// 跑一次完整 run，返回最终回复、对话与终止原因
pub async fn run_message(
    components: &AgentComponents,
    user_input: &str,
    cancel_token: CancellationToken,
) -> Result<ReactResult, AgentError> {
    let session = components.session().with_cancel_token(cancel_token);
    react_loop(&session, user_input).await
}

/// 处理单条用户消息（无 stream），返回最终回复文本
pub async fn process_message(
    components: &AgentComponents,
    user_input: &str,
) -> Result<String, AgentError> {
    let result = run_message(components, user_input, CancellationToken::new()).await?;
    Ok(result.response)
}

/// 流式处理单条用户消息：通过 event_tx 推送 StepUpdate / ToolCall / Observation / MessageDone
pub async fn process_message_stream(
    components: &AgentComponents,
    user_input: &str,
    event_tx: mpsc::UnboundedSender<ReactEvent>,
    cancel_token: CancellationToken,
) -> Result<String, AgentError> {
    let session = components
        .session()
        .with_cancel_token(cancel_token)
        .with_event_tx(&event_tx);
    let result = react_loop(&session, user_input).await?;
    Ok(result.response)
}
