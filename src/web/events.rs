//! 日程 REST 接口（前端直接访问，不经过 Agent）

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::calendar::{CreateEventRequest, Event, SyncReport, UpdateEventRequest, DEFAULT_IMPORT_DAYS};
use crate::integrations::NotificationKind;
use crate::web::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    pub days_ahead: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReminderRequest {
    pub recipient: String,
    #[serde(default)]
    pub notification_type: NotificationKind,
}

/// POST /events
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.components.calendar.create(req).await?))
}

/// GET /events?start_date=&end_date=
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let events = state
        .components
        .calendar
        .list(q.start_date.as_deref(), q.end_date.as_deref())
        .await?;
    Ok(Json(events))
}

/// GET /events/today/list
pub async fn today_events(State(state): State<Arc<AppState>>) -> Json<Vec<Event>> {
    Json(state.components.calendar.today().await)
}

/// GET /events/import-google?days_ahead=30
pub async fn import_google(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ImportQuery>,
) -> Result<Json<Value>, ApiError> {
    let events = state
        .components
        .calendar
        .import_from_google(q.days_ahead.unwrap_or(DEFAULT_IMPORT_DAYS))
        .await?;
    Ok(Json(json!({
        "success": true,
        "imported_count": events.len(),
        "events": events,
    })))
}

/// GET /events/:id
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.components.calendar.get(&id).await?))
}

/// PUT /events/:id
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.components.calendar.update(&id, req).await?))
}

/// DELETE /events/:id
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let event = state.components.calendar.delete(&id).await?;
    Ok(Json(json!({ "success": true, "deleted_id": event.id })))
}

/// POST /events/:id/reminder
pub async fn send_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ReminderRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .components
        .calendar
        .send_reminder(&id, &req.recipient, req.notification_type)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /events/:id/sync-google
pub async fn sync_google(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SyncReport>, ApiError> {
    Ok(Json(state.components.calendar.sync_event(&id).await?))
}
