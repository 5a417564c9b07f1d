//! 日历领域：日程模型、内存存储、日历服务与日历工具

pub mod error;
pub mod event;
pub mod service;
pub mod store;
pub mod tools;

pub use error::CalendarError;
pub use event::{parse_datetime, CreateEventRequest, Event, UpdateEventRequest, DEFAULT_EVENT_COLOR};
pub use service::{CalendarService, SyncDetails, SyncReport, DEFAULT_IMPORT_DAYS};
pub use store::{EventFilter, EventStore};
pub use tools::{register_calendar_tools, CalendarCapability, CalendarTool};
