//! 日历工具：以封闭枚举 CalendarCapability 描述全部能力，分派处穷尽匹配
//!
//! 参数结构体同时生成 input_schema 与反序列化参数；返回载荷为 JSON 对象，
//! 失败时由 ToolError 交给执行器折叠为 ToolResult{success:false}。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::calendar::service::{SyncDetails, DEFAULT_IMPORT_DAYS};
use crate::calendar::{CalendarService, CreateEventRequest, UpdateEventRequest};
use crate::core::AgentError;
use crate::integrations::NotificationKind;
use crate::tools::{input_schema_for, JsonMap, ToolDefinition, ToolError, ToolHandler, ToolRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalendarCapability {
    CreateEvent,
    GetEvents,
    UpdateEvent,
    DeleteEvent,
    GetTodayEvents,
    SendReminder,
    SyncGoogle,
    ImportGoogle,
}

impl CalendarCapability {
    /// 注册顺序即 /mcp/tools 的列出顺序
    pub const ALL: [CalendarCapability; 8] = [
        CalendarCapability::CreateEvent,
        CalendarCapability::GetEvents,
        CalendarCapability::UpdateEvent,
        CalendarCapability::DeleteEvent,
        CalendarCapability::GetTodayEvents,
        CalendarCapability::SendReminder,
        CalendarCapability::SyncGoogle,
        CalendarCapability::ImportGoogle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CalendarCapability::CreateEvent => "calendar_create_event",
            CalendarCapability::GetEvents => "calendar_get_events",
            CalendarCapability::UpdateEvent => "calendar_update_event",
            CalendarCapability::DeleteEvent => "calendar_delete_event",
            CalendarCapability::GetTodayEvents => "calendar_get_today_events",
            CalendarCapability::SendReminder => "calendar_send_reminder",
            CalendarCapability::SyncGoogle => "calendar_sync_google",
            CalendarCapability::ImportGoogle => "calendar_import_google",
        }
    }

    fn description(self) -> &'static str {
        match self {
            CalendarCapability::CreateEvent => {
                "Create a new calendar event with optional Google Calendar sync and email invitations to attendees"
            }
            CalendarCapability::GetEvents => {
                "Get calendar events, optionally filtered by date range, sorted by start time"
            }
            CalendarCapability::UpdateEvent => {
                "Update an existing calendar event; only the given fields change"
            }
            CalendarCapability::DeleteEvent => {
                "Delete a calendar event and notify its attendees"
            }
            CalendarCapability::GetTodayEvents => "Get all events that start today",
            CalendarCapability::SendReminder => "Send an email reminder for an event",
            CalendarCapability::SyncGoogle => {
                "Sync an event to Google Calendar, either by event_id or from raw event details"
            }
            CalendarCapability::ImportGoogle => "Import upcoming events from Google Calendar",
        }
    }

    fn input_schema(self) -> Value {
        match self {
            CalendarCapability::CreateEvent => input_schema_for::<CreateEventRequest>(),
            CalendarCapability::GetEvents => input_schema_for::<GetEventsArgs>(),
            CalendarCapability::UpdateEvent => input_schema_for::<UpdateEventArgs>(),
            CalendarCapability::DeleteEvent => input_schema_for::<EventIdArgs>(),
            CalendarCapability::GetTodayEvents => input_schema_for::<NoArgs>(),
            CalendarCapability::SendReminder => input_schema_for::<SendReminderArgs>(),
            CalendarCapability::SyncGoogle => input_schema_for::<SyncGoogleArgs>(),
            CalendarCapability::ImportGoogle => input_schema_for::<ImportGoogleArgs>(),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GetEventsArgs {
    #[serde(default)]
    #[schemars(description = "Only events starting at or after this time (ISO 8601)")]
    start_date: Option<String>,
    #[serde(default)]
    #[schemars(description = "Only events ending at or before this time (ISO 8601)")]
    end_date: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EventIdArgs {
    #[schemars(description = "Event ID")]
    event_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateEventArgs {
    #[schemars(description = "Event ID to update")]
    event_id: String,
    #[serde(flatten)]
    changes: UpdateEventRequest,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct NoArgs {}

#[derive(Debug, Deserialize, JsonSchema)]
struct SendReminderArgs {
    #[schemars(description = "Event ID")]
    event_id: String,
    #[schemars(description = "Recipient email address")]
    recipient: String,
    #[serde(default)]
    #[schemars(description = "reminder (default), invitation, update or cancellation")]
    notification_type: Option<NotificationKind>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SyncGoogleArgs {
    #[serde(default)]
    #[schemars(description = "ID of an existing event; when omitted, start_time and end_time are required")]
    event_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    attendees: Vec<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ImportGoogleArgs {
    #[serde(default)]
    #[schemars(description = "Number of days ahead to import (default 30)")]
    days_ahead: Option<i64>,
}

/// 单个日历工具的处理器
pub struct CalendarTool {
    capability: CalendarCapability,
    service: Arc<CalendarService>,
}

impl CalendarTool {
    pub fn new(capability: CalendarCapability, service: Arc<CalendarService>) -> Self {
        Self {
            capability,
            service,
        }
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: JsonMap) -> Result<T, ToolError> {
    Ok(serde_json::from_value(Value::Object(args))?)
}

fn to_payload<T: Serialize>(value: T) -> Result<JsonMap, ToolError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => {
            let mut map = JsonMap::new();
            map.insert("result".into(), other);
            Ok(map)
        }
        Err(e) => Err(ToolError::Failed(e.to_string())),
    }
}

#[async_trait]
impl ToolHandler for CalendarTool {
    async fn handle(&self, args: JsonMap) -> Result<JsonMap, ToolError> {
        let svc = &self.service;
        match self.capability {
            CalendarCapability::CreateEvent => {
                let req: CreateEventRequest = parse_args(args)?;
                let event = svc.create(req).await?;
                to_payload(json!({ "success": true, "event": event }))
            }
            CalendarCapability::GetEvents => {
                let a: GetEventsArgs = parse_args(args)?;
                let events = svc.list(a.start_date.as_deref(), a.end_date.as_deref()).await?;
                to_payload(json!({ "success": true, "count": events.len(), "events": events }))
            }
            CalendarCapability::UpdateEvent => {
                let a: UpdateEventArgs = parse_args(args)?;
                let event = svc.update(&a.event_id, a.changes).await?;
                to_payload(json!({ "success": true, "event": event }))
            }
            CalendarCapability::DeleteEvent => {
                let a: EventIdArgs = parse_args(args)?;
                let event = svc.delete(&a.event_id).await?;
                to_payload(json!({ "success": true, "deleted_id": event.id }))
            }
            CalendarCapability::GetTodayEvents => {
                let events = svc.today().await;
                to_payload(json!({ "success": true, "count": events.len(), "events": events }))
            }
            CalendarCapability::SendReminder => {
                let a: SendReminderArgs = parse_args(args)?;
                let kind = a.notification_type.unwrap_or_default();
                svc.send_reminder(&a.event_id, &a.recipient, kind).await?;
                to_payload(json!({
                    "success": true,
                    "message": format!("Reminder sent to {}", a.recipient),
                }))
            }
            CalendarCapability::SyncGoogle => {
                let a: SyncGoogleArgs = parse_args(args)?;
                let report = match a.event_id.filter(|id| !id.is_empty()) {
                    Some(id) => svc.sync_event(&id).await?,
                    None => {
                        let (start_time, end_time) = match (a.start_time, a.end_time) {
                            (Some(s), Some(e)) => (s, e),
                            _ => {
                                return Err(ToolError::InvalidArguments(
                                    "calendar_sync_google expects either event_id or start_time and end_time"
                                        .into(),
                                ))
                            }
                        };
                        svc.sync_details(SyncDetails {
                            title: a.title,
                            description: a.description,
                            start_time,
                            end_time,
                            location: a.location,
                            attendees: a.attendees,
                            color: a.color,
                        })
                        .await?
                    }
                };
                to_payload(report)
            }
            CalendarCapability::ImportGoogle => {
                let a: ImportGoogleArgs = parse_args(args)?;
                let events = svc
                    .import_from_google(a.days_ahead.unwrap_or(DEFAULT_IMPORT_DAYS))
                    .await?;
                to_payload(json!({
                    "success": true,
                    "imported_count": events.len(),
                    "events": events,
                }))
            }
        }
    }
}

/// 把全部日历能力注册进工具注册表
pub fn register_calendar_tools(
    registry: &mut ToolRegistry,
    service: Arc<CalendarService>,
) -> Result<(), AgentError> {
    for capability in CalendarCapability::ALL {
        registry.register(
            capability.definition(),
            Arc::new(CalendarTool::new(capability, service.clone())),
        )?;
    }
    Ok(())
}
