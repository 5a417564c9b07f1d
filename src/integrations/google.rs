//! Google Calendar 同步（REST v3）
//!
//! upsert：有 google_event_id 时 PUT 更新，否则 POST 新建；提醒固定为邮件提前 1 天 + 弹窗提前 30 分钟。
//! list：按时间窗口拉取单次展开后的事件，转换为本地 Event（id 沿用 Google 事件 id）。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::calendar::{parse_datetime, Event, DEFAULT_EVENT_COLOR};
use crate::integrations::TokenStore;

pub const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Error, Debug)]
pub enum GoogleError {
    #[error("Google Calendar sync is disabled")]
    Disabled,

    #[error("Google auth error: {0}")]
    Auth(String),

    #[error("Google API returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Google request failed: {0}")]
    Request(String),

    #[error("Invalid Google response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GoogleError {
    fn from(e: reqwest::Error) -> Self {
        GoogleError::Request(e.to_string())
    }
}

/// 外部日历同步 trait
#[async_trait]
pub trait GoogleCalendar: Send + Sync {
    /// 新建或更新远端事件，返回 Google 事件 id
    async fn upsert(&self, event: &Event) -> Result<String, GoogleError>;

    /// 拉取 [time_min, time_max) 内的事件
    async fn list(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<Event>, GoogleError>;
}

/// REST 客户端
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    tokens: Arc<TokenStore>,
    base_url: String,
    calendar_id: String,
    tz: Tz,
}

impl GoogleCalendarClient {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<TokenStore>,
        calendar_id: impl Into<String>,
        tz: Tz,
    ) -> Self {
        Self {
            http,
            tokens,
            base_url: GOOGLE_CALENDAR_API.to_string(),
            calendar_id: calendar_id.into(),
            tz,
        }
    }

    /// 测试时指向 mock 服务
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.base_url, self.calendar_id)
    }

    fn event_body(&self, event: &Event) -> Value {
        let tz_name = self.tz.name();
        let attendees: Vec<Value> = event
            .attendees
            .iter()
            .map(|email| json!({ "email": email }))
            .collect();
        json!({
            "summary": event.title,
            "location": event.location.clone().unwrap_or_default(),
            "description": event.description.clone().unwrap_or_default(),
            "start": {
                "dateTime": event.start_time.with_timezone(&self.tz).to_rfc3339(),
                "timeZone": tz_name,
            },
            "end": {
                "dateTime": event.end_time.with_timezone(&self.tz).to_rfc3339(),
                "timeZone": tz_name,
            },
            "attendees": attendees,
            "reminders": {
                "useDefault": false,
                "overrides": [
                    { "method": "email", "minutes": 24 * 60 },
                    { "method": "popup", "minutes": 30 },
                ],
            },
        })
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GoogleError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(GoogleError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl GoogleCalendar for GoogleCalendarClient {
    async fn upsert(&self, event: &Event) -> Result<String, GoogleError> {
        let token = self.tokens.access_token().await?;
        let body = self.event_body(event);
        let request = match &event.google_event_id {
            Some(gid) => self.http.put(format!("{}/{}", self.events_url(), gid)),
            None => self.http.post(self.events_url()),
        };
        let resp = check_status(request.bearer_auth(token).json(&body).send().await?).await?;
        let created: GoogleEvent = resp
            .json()
            .await
            .map_err(|e| GoogleError::InvalidResponse(e.to_string()))?;
        tracing::info!(event_id = %event.id, google_event_id = %created.id, "synced event to Google Calendar");
        Ok(created.id)
    }

    async fn list(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<Event>, GoogleError> {
        let token = self.tokens.access_token().await?;
        let time_min = time_min.to_rfc3339();
        let time_max = time_max.to_rfc3339();
        let resp = self
            .http
            .get(self.events_url())
            .bearer_auth(token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;
        let page: EventsPage = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| GoogleError::InvalidResponse(e.to_string()))?;

        let mut events = Vec::with_capacity(page.items.len());
        for item in page.items {
            match item.into_event() {
                Ok(e) => events.push(e),
                Err(e) => tracing::warn!(error = %e, "skipping malformed Google event"),
            }
        }
        Ok(events)
    }
}

/// 未启用 Google 同步时的占位实现
#[derive(Default)]
pub struct DisabledGoogleCalendar;

#[async_trait]
impl GoogleCalendar for DisabledGoogleCalendar {
    async fn upsert(&self, _event: &Event) -> Result<String, GoogleError> {
        Err(GoogleError::Disabled)
    }

    async fn list(
        &self,
        _time_min: DateTime<Utc>,
        _time_max: DateTime<Utc>,
    ) -> Result<Vec<Event>, GoogleError> {
        Err(GoogleError::Disabled)
    }
}

#[derive(Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Deserialize)]
struct GoogleEvent {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    start: Option<GoogleTime>,
    #[serde(default)]
    end: Option<GoogleTime>,
    #[serde(default)]
    attendees: Vec<GoogleAttendee>,
}

#[derive(Deserialize)]
struct GoogleTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct GoogleAttendee {
    #[serde(default)]
    email: Option<String>,
}

impl GoogleTime {
    fn parse(&self) -> Result<DateTime<Utc>, GoogleError> {
        let raw = self
            .date_time
            .as_deref()
            .or(self.date.as_deref())
            .ok_or_else(|| GoogleError::InvalidResponse("event time has neither dateTime nor date".into()))?;
        parse_datetime(raw).map_err(|e| GoogleError::InvalidResponse(e.to_string()))
    }
}

impl GoogleEvent {
    fn into_event(self) -> Result<Event, GoogleError> {
        let missing = || GoogleError::InvalidResponse(format!("event {} has no start/end", self.id));
        let start_time = self.start.as_ref().ok_or_else(missing)?.parse()?;
        let end_time = self.end.as_ref().ok_or_else(missing)?.parse()?;
        Ok(Event {
            id: self.id.clone(),
            title: self.summary.unwrap_or_else(|| "No Title".to_string()),
            description: self.description,
            start_time,
            end_time,
            location: self.location,
            attendees: self.attendees.into_iter().filter_map(|a| a.email).collect(),
            color: DEFAULT_EVENT_COLOR.to_string(),
            created_at: Utc::now(),
            reminder_sent: false,
            google_event_id: Some(self.id),
            notify_attendees: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::StoredToken;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer, dir: &tempfile::TempDir) -> GoogleCalendarClient {
        let http = reqwest::Client::new();
        let tokens = Arc::new(TokenStore::new(dir.path().join("token.json"), http.clone()));
        tokens
            .save(&StoredToken {
                token: "access-1".into(),
                refresh_token: None,
                token_uri: format!("{}/token", server.uri()),
                client_id: "cid".into(),
                client_secret: "s".into(),
                scopes: vec![],
                expiry: None,
            })
            .await
            .unwrap();
        GoogleCalendarClient::new(http, tokens, "primary", chrono_tz::America::Chicago)
            .with_base_url(server.uri())
    }

    fn event(google_id: Option<&str>) -> Event {
        Event {
            id: "local-1".into(),
            title: "Meeting".into(),
            description: None,
            start_time: parse_datetime("2025-12-12T19:00:00Z").unwrap(),
            end_time: parse_datetime("2025-12-12T20:00:00Z").unwrap(),
            location: None,
            attendees: vec!["a@example.com".into()],
            color: DEFAULT_EVENT_COLOR.into(),
            created_at: Utc::now(),
            reminder_sent: false,
            google_event_id: google_id.map(String::from),
            notify_attendees: true,
        }
    }

    #[tokio::test]
    async fn test_insert_new_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(header("authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "g-123"})))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let gid = client(&server, &dir).await.upsert(&event(None)).await.unwrap();
        assert_eq!(gid, "g-123");

        let received = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["start"]["timeZone"], "America/Chicago");
        assert_eq!(body["start"]["dateTime"], "2025-12-12T13:00:00-06:00");
        assert_eq!(body["reminders"]["overrides"][0]["minutes"], 1440);
        assert_eq!(body["attendees"][0]["email"], "a@example.com");
    }

    #[tokio::test]
    async fn test_update_existing_event() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/calendars/primary/events/g-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "g-9"})))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let gid = client(&server, &dir).await.upsert(&event(Some("g-9"))).await.unwrap();
        assert_eq!(gid, "g-9");
    }

    #[tokio::test]
    async fn test_http_error_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let err = client(&server, &dir).await.upsert(&event(None)).await.unwrap_err();
        assert!(matches!(err, GoogleError::Http { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_list_converts_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {
                        "id": "g-1",
                        "summary": "Dentist",
                        "start": {"dateTime": "2025-12-15T09:00:00-06:00"},
                        "end": {"dateTime": "2025-12-15T10:00:00-06:00"},
                        "attendees": [{"email": "me@example.com"}]
                    },
                    {
                        "id": "g-2",
                        "start": {"date": "2025-12-20"},
                        "end": {"date": "2025-12-21"}
                    },
                    { "id": "g-broken" }
                ]
            })))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let events = client(&server, &dir)
            .await
            .list(now, now + chrono::Duration::days(30))
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "g-1");
        assert_eq!(events[0].google_event_id.as_deref(), Some("g-1"));
        assert_eq!(events[0].start_time, parse_datetime("2025-12-15T15:00:00Z").unwrap());
        assert_eq!(events[0].attendees, vec!["me@example.com".to_string()]);
        assert_eq!(events[1].title, "No Title");
    }

    #[tokio::test]
    async fn test_disabled_client() {
        assert!(matches!(
            DisabledGoogleCalendar.upsert(&event(None)).await,
            Err(GoogleError::Disabled)
        ));
    }
}
