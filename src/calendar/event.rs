//! 日程数据模型与时间解析

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarError;

pub const DEFAULT_EVENT_COLOR: &str = "#3b82f6";

/// 一条日程
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default = "default_color")]
    pub color: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reminder_sent: bool,
    #[serde(default)]
    pub google_event_id: Option<String>,
    #[serde(default = "default_true")]
    pub notify_attendees: bool,
}

impl Event {
    /// 由创建请求构造；id 为新 uuid
    pub fn from_request(req: &CreateEventRequest) -> Result<Self, CalendarError> {
        let start_time = parse_datetime(&req.start_time)?;
        let end_time = parse_datetime(&req.end_time)?;
        ensure_ordered(start_time, end_time)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: req.title.clone(),
            description: req.description.clone(),
            start_time,
            end_time,
            location: req.location.clone(),
            attendees: req.attendees.clone(),
            color: req.color.clone(),
            created_at: Utc::now(),
            reminder_sent: false,
            google_event_id: None,
            notify_attendees: req.notify_attendees,
        })
    }

    /// 部分更新：只覆盖请求中给出的字段；时间非法时不做任何修改
    pub fn apply(&mut self, update: &UpdateEventRequest) -> Result<(), CalendarError> {
        let start_time = match &update.start_time {
            Some(s) => parse_datetime(s)?,
            None => self.start_time,
        };
        let end_time = match &update.end_time {
            Some(s) => parse_datetime(s)?,
            None => self.end_time,
        };
        ensure_ordered(start_time, end_time)?;

        self.start_time = start_time;
        self.end_time = end_time;
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
        if let Some(location) = &update.location {
            self.location = Some(location.clone());
        }
        if let Some(attendees) = &update.attendees {
            self.attendees = attendees.clone();
        }
        if let Some(color) = &update.color {
            self.color = color.clone();
        }
        if let Some(notify) = update.notify_attendees {
            self.notify_attendees = notify;
        }
        Ok(())
    }
}

fn ensure_ordered(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), CalendarError> {
    if end < start {
        return Err(CalendarError::InvalidInput(format!(
            "end_time {} is before start_time {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        )));
    }
    Ok(())
}

/// 创建日程请求（REST 与 calendar_create_event 工具共用）
#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct CreateEventRequest {
    #[schemars(description = "Event title")]
    pub title: String,
    #[serde(default)]
    #[schemars(description = "Event description")]
    pub description: Option<String>,
    #[schemars(description = "Start time in ISO 8601 format, e.g. 2025-12-12T13:00:00-06:00")]
    pub start_time: String,
    #[schemars(description = "End time in ISO 8601 format")]
    pub end_time: String,
    #[serde(default)]
    #[schemars(description = "Event location")]
    pub location: Option<String>,
    #[serde(default)]
    #[schemars(description = "Attendee email addresses")]
    pub attendees: Vec<String>,
    #[serde(default = "default_color")]
    #[schemars(description = "Event color hex code")]
    pub color: String,
    #[serde(default = "default_true")]
    #[schemars(description = "Email invitations to attendees (default true)")]
    pub notify_attendees: bool,
    #[serde(default)]
    #[schemars(description = "Also create the event in Google Calendar")]
    pub sync_to_google: bool,
}

/// 部分更新请求：None 表示不修改
#[derive(Clone, Debug, Default, Deserialize, JsonSchema)]
pub struct UpdateEventRequest {
    #[serde(default)]
    #[schemars(description = "New event title")]
    pub title: Option<String>,
    #[serde(default)]
    #[schemars(description = "New event description")]
    pub description: Option<String>,
    #[serde(default)]
    #[schemars(description = "New start time (ISO 8601)")]
    pub start_time: Option<String>,
    #[serde(default)]
    #[schemars(description = "New end time (ISO 8601)")]
    pub end_time: Option<String>,
    #[serde(default)]
    #[schemars(description = "New location")]
    pub location: Option<String>,
    #[serde(default)]
    #[schemars(description = "New attendee list (replaces the old one)")]
    pub attendees: Option<Vec<String>>,
    #[serde(default)]
    #[schemars(description = "New color hex code")]
    pub color: Option<String>,
    #[serde(default)]
    #[schemars(description = "Whether attendees receive update emails")]
    pub notify_attendees: Option<bool>,
}

fn default_color() -> String {
    DEFAULT_EVENT_COLOR.to_string()
}

fn default_true() -> bool {
    true
}

/// 解析时间字符串
///
/// 支持：RFC 3339（`Z` 或偏移）、`YYYY-MM-DDTHH:MM[:SS[.f]]`、`YYYY-MM-DD HH:MM[:SS[.f]]`（无时区按 UTC）、
/// 纯日期 `YYYY-MM-DD`（当日 00:00 UTC）。
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>, CalendarError> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(CalendarError::InvalidInput(format!(
        "unrecognized datetime '{input}'"
    )))
}
