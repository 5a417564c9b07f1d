//! 内存日程存储
//!
//! 进程内唯一的可变共享状态；由调用方显式注入（Arc<EventStore>），不使用全局变量。
//! 不做持久化，重启即清空。

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::sync::RwLock;

use crate::calendar::{CalendarError, Event};

/// 列表过滤条件：start_time >= start 且 end_time <= end
#[derive(Clone, Copy, Debug, Default)]
pub struct EventFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EventFilter {
    fn matches(&self, event: &Event) -> bool {
        self.start.map_or(true, |s| event.start_time >= s)
            && self.end.map_or(true, |e| event.end_time <= e)
    }
}

#[derive(Default)]
pub struct EventStore {
    events: RwLock<HashMap<String, Event>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按 id 写入（已存在则覆盖），返回写入的日程
    pub async fn insert(&self, event: Event) -> Event {
        let mut events = self.events.write().await;
        events.insert(event.id.clone(), event.clone());
        event
    }

    pub async fn get(&self, id: &str) -> Option<Event> {
        self.events.read().await.get(id).cloned()
    }

    /// 在写锁内修改一条日程；闭包返回错误时日程保持原样
    pub async fn update<F>(&self, id: &str, f: F) -> Result<Event, CalendarError>
    where
        F: FnOnce(&mut Event) -> Result<(), CalendarError>,
    {
        let mut events = self.events.write().await;
        let event = events
            .get_mut(id)
            .ok_or_else(|| CalendarError::NotFound(id.to_string()))?;
        let mut draft = event.clone();
        f(&mut draft)?;
        *event = draft.clone();
        Ok(draft)
    }

    pub async fn remove(&self, id: &str) -> Option<Event> {
        self.events.write().await.remove(id)
    }

    /// 过滤后按开始时间排序
    pub async fn list(&self, filter: &EventFilter) -> Vec<Event> {
        let events = self.events.read().await;
        let mut out: Vec<Event> = events.values().filter(|e| filter.matches(e)).cloned().collect();
        out.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// 开始时间落在 tz 时区某一天的日程
    pub async fn on_day(&self, day: NaiveDate, tz: Tz) -> Vec<Event> {
        let events = self.events.read().await;
        let mut out: Vec<Event> = events
            .values()
            .filter(|e| e.start_time.with_timezone(&tz).date_naive() == day)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        out
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::parse_datetime;

    fn event(id: &str, start: &str, end: &str) -> Event {
        Event {
            id: id.into(),
            title: id.into(),
            description: None,
            start_time: parse_datetime(start).unwrap(),
            end_time: parse_datetime(end).unwrap(),
            location: None,
            attendees: vec![],
            color: "#3b82f6".into(),
            created_at: Utc::now(),
            reminder_sent: false,
            google_event_id: None,
            notify_attendees: true,
        }
    }

    #[tokio::test]
    async fn test_crud() {
        let store = EventStore::new();
        store.insert(event("a", "2025-01-01T10:00:00Z", "2025-01-01T11:00:00Z")).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("a").await.unwrap().title, "a");

        let updated = store
            .update("a", |e| {
                e.title = "renamed".into();
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(store.get("a").await.unwrap().title, "renamed");

        assert!(matches!(
            store.update("missing", |_| Ok(())).await,
            Err(CalendarError::NotFound(_))
        ));

        assert!(store.remove("a").await.is_some());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_event() {
        let store = EventStore::new();
        store.insert(event("a", "2025-01-01T10:00:00Z", "2025-01-01T11:00:00Z")).await;
        let res = store
            .update("a", |e| {
                e.title = "half-written".into();
                Err(CalendarError::InvalidInput("nope".into()))
            })
            .await;
        assert!(res.is_err());
        assert_eq!(store.get("a").await.unwrap().title, "a");
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let store = EventStore::new();
        store.insert(event("late", "2025-01-03T10:00:00Z", "2025-01-03T11:00:00Z")).await;
        store.insert(event("early", "2025-01-01T10:00:00Z", "2025-01-01T11:00:00Z")).await;
        store.insert(event("mid", "2025-01-02T10:00:00Z", "2025-01-02T11:00:00Z")).await;

        let all = store.list(&EventFilter::default()).await;
        let ids: Vec<_> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["early", "mid", "late"]);

        let filter = EventFilter {
            start: Some(parse_datetime("2025-01-02").unwrap()),
            end: Some(parse_datetime("2025-01-02T23:59:59Z").unwrap()),
        };
        let ids: Vec<_> = store.list(&filter).await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, ["mid"]);
    }

    #[tokio::test]
    async fn test_on_day_uses_time_zone() {
        let store = EventStore::new();
        // 01:00 UTC on Jan 2 is still Jan 1 in Chicago
        store.insert(event("night", "2025-01-02T01:00:00Z", "2025-01-02T02:00:00Z")).await;
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(store.on_day(day, chrono_tz::America::Chicago).await.len(), 1);
        assert!(store.on_day(day, chrono_tz::UTC).await.is_empty());
    }
}
