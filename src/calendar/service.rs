//! 日历服务：日程 CRUD + Google 同步 + 邮件通知
//!
//! REST 路由与日历工具共用同一个服务实例。通知发送在后台任务中进行，不阻塞调用方；
//! 发送失败只记日志。

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::calendar::{
    parse_datetime, CalendarError, CreateEventRequest, Event, EventFilter, EventStore,
    UpdateEventRequest,
};
use crate::integrations::{GoogleCalendar, NotificationKind, Notifier};

/// 默认导入未来多少天
pub const DEFAULT_IMPORT_DAYS: i64 = 30;
const SYNC_FAILED_MESSAGE: &str = "Failed to sync with Google Calendar";

/// Google 同步结果
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncReport {
    fn synced(google_event_id: String, event: Option<Event>) -> Self {
        Self {
            success: true,
            google_event_id: Some(google_event_id),
            event,
            message: None,
        }
    }

    fn failed() -> Self {
        Self {
            success: false,
            google_event_id: None,
            event: None,
            message: Some(SYNC_FAILED_MESSAGE.to_string()),
        }
    }
}

/// 按详情同步（无 event_id 时）所需字段
#[derive(Debug, Clone, Default)]
pub struct SyncDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub location: Option<String>,
    pub attendees: Vec<String>,
    pub color: Option<String>,
}

pub struct CalendarService {
    store: Arc<EventStore>,
    google: Arc<dyn GoogleCalendar>,
    notifier: Arc<dyn Notifier>,
    tz: Tz,
}

impl CalendarService {
    pub fn new(
        store: Arc<EventStore>,
        google: Arc<dyn GoogleCalendar>,
        notifier: Arc<dyn Notifier>,
        tz: Tz,
    ) -> Self {
        Self {
            store,
            google,
            notifier,
            tz,
        }
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn time_zone(&self) -> Tz {
        self.tz
    }

    /// 新建日程；可选同步到 Google（失败不影响本地创建），按需给参会人发邀请
    pub async fn create(&self, req: CreateEventRequest) -> Result<Event, CalendarError> {
        let event = self.store.insert(Event::from_request(&req)?).await;
        tracing::info!(event_id = %event.id, title = %event.title, "event created");

        let event = if req.sync_to_google {
            match self.google.upsert(&event).await {
                Ok(gid) => self.attach_google_id(&event.id, gid).await?,
                Err(e) => {
                    tracing::warn!(event_id = %event.id, error = %e, "Google Calendar sync failed");
                    event
                }
            }
        } else {
            event
        };

        self.notify_attendees(&event, NotificationKind::Invitation);
        Ok(event)
    }

    pub async fn get(&self, id: &str) -> Result<Event, CalendarError> {
        self.store
            .get(id)
            .await
            .ok_or_else(|| CalendarError::NotFound(id.to_string()))
    }

    /// 按时间范围列出（字符串参数，解析失败返回 InvalidInput）
    pub async fn list(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Vec<Event>, CalendarError> {
        let filter = EventFilter {
            start: start_date.map(parse_datetime).transpose()?,
            end: end_date.map(parse_datetime).transpose()?,
        };
        Ok(self.store.list(&filter).await)
    }

    pub async fn update(&self, id: &str, req: UpdateEventRequest) -> Result<Event, CalendarError> {
        let event = self.store.update(id, |e| e.apply(&req)).await?;
        tracing::info!(event_id = %event.id, "event updated");
        self.notify_attendees(&event, NotificationKind::Update);
        Ok(event)
    }

    /// 删除并给参会人发取消通知，返回被删除的日程
    pub async fn delete(&self, id: &str) -> Result<Event, CalendarError> {
        let event = self
            .store
            .remove(id)
            .await
            .ok_or_else(|| CalendarError::NotFound(id.to_string()))?;
        tracing::info!(event_id = %event.id, "event deleted");
        self.notify_attendees(&event, NotificationKind::Cancellation);
        Ok(event)
    }

    /// 配置时区下"今天"开始的日程
    pub async fn today(&self) -> Vec<Event> {
        let today = Utc::now().with_timezone(&self.tz).date_naive();
        self.store.on_day(today, self.tz).await
    }

    /// 后台发送单条通知；提醒发送成功后标记 reminder_sent
    pub async fn send_reminder(
        &self,
        id: &str,
        recipient: &str,
        kind: NotificationKind,
    ) -> Result<(), CalendarError> {
        let event = self.get(id).await?;
        let notifier = self.notifier.clone();
        let store = self.store.clone();
        let recipient = recipient.to_string();
        tokio::spawn(async move {
            match notifier.notify(&event, &recipient, kind).await {
                Ok(()) if kind == NotificationKind::Reminder => {
                    let marked = store
                        .update(&event.id, |e| {
                            e.reminder_sent = true;
                            Ok(())
                        })
                        .await;
                    if let Err(e) = marked {
                        tracing::debug!(event_id = %event.id, error = %e, "event gone before reminder was marked");
                    }
                }
                Ok(()) => {}
                Err(e) => tracing::warn!(event_id = %event.id, %recipient, error = %e, "notification failed"),
            }
        });
        Ok(())
    }

    /// 同步已有日程
    pub async fn sync_event(&self, id: &str) -> Result<SyncReport, CalendarError> {
        let event = self.get(id).await?;
        match self.google.upsert(&event).await {
            Ok(gid) => {
                self.attach_google_id(id, gid.clone()).await?;
                Ok(SyncReport::synced(gid, None))
            }
            Err(e) => {
                tracing::warn!(event_id = %id, error = %e, "Google Calendar sync failed");
                Ok(SyncReport::failed())
            }
        }
    }

    /// 按原始详情同步：先推到 Google，成功后才写入本地
    pub async fn sync_details(&self, details: SyncDetails) -> Result<SyncReport, CalendarError> {
        let req = CreateEventRequest {
            title: details.title.unwrap_or_else(|| "Untitled Event".to_string()),
            description: details.description,
            start_time: details.start_time,
            end_time: details.end_time,
            location: details.location,
            attendees: details.attendees,
            color: details
                .color
                .unwrap_or_else(|| crate::calendar::DEFAULT_EVENT_COLOR.to_string()),
            notify_attendees: true,
            sync_to_google: true,
        };
        let mut event = Event::from_request(&req)?;
        match self.google.upsert(&event).await {
            Ok(gid) => {
                event.google_event_id = Some(gid.clone());
                let event = self.store.insert(event).await;
                Ok(SyncReport::synced(gid, Some(event)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Google Calendar sync failed");
                Ok(SyncReport::failed())
            }
        }
    }

    /// 导入未来 days_ahead 天的 Google 事件；Google 调用失败时记日志并返回空列表
    pub async fn import_from_google(&self, days_ahead: i64) -> Result<Vec<Event>, CalendarError> {
        let time_min = Utc::now();
        let time_max = TimeDelta::try_days(days_ahead.max(0))
            .and_then(|window| time_min.checked_add_signed(window))
            .ok_or_else(|| {
                CalendarError::InvalidInput(format!("days_ahead out of range: {days_ahead}"))
            })?;
        let events = match self.google.list(time_min, time_max).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "Google Calendar import failed");
                return Ok(Vec::new());
            }
        };
        let mut imported = Vec::with_capacity(events.len());
        for event in events {
            imported.push(self.store.insert(event).await);
        }
        tracing::info!(count = imported.len(), days_ahead, "imported events from Google Calendar");
        Ok(imported)
    }

    async fn attach_google_id(&self, id: &str, gid: String) -> Result<Event, CalendarError> {
        self.store
            .update(id, move |e| {
                e.google_event_id = Some(gid);
                Ok(())
            })
            .await
    }

    fn notify_attendees(&self, event: &Event, kind: NotificationKind) {
        if !event.notify_attendees || event.attendees.is_empty() {
            return;
        }
        for attendee in &event.attendees {
            let notifier = self.notifier.clone();
            let event = event.clone();
            let attendee = attendee.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(&event, &attendee, kind).await {
                    tracing::warn!(event_id = %event.id, recipient = %attendee, kind = kind.as_str(), error = %e, "notification failed");
                }
            });
        }
    }
}
