//! HTTP 错误映射：内部错误 -> 状态码 + `{"detail": ...}`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::calendar::CalendarError;
use crate::core::AgentError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<CalendarError> for ApiError {
    fn from(e: CalendarError) -> Self {
        match e {
            CalendarError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "Event not found"),
            CalendarError::InvalidInput(msg) => Self::bad_request(msg),
            other => {
                tracing::error!(error = %other, "calendar operation failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        if e.is_unavailable() {
            tracing::warn!(error = %e, "chat failed: provider unavailable");
            return Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "LLM backend is unavailable. Please ensure the model server is running.",
            );
        }
        tracing::error!(error = %e, "chat failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("AI Agent Error: {e}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    #[test]
    fn test_status_mapping() {
        let e: ApiError = CalendarError::NotFound("x".into()).into();
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        let e: ApiError = CalendarError::InvalidInput("bad".into()).into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        let e: ApiError = AgentError::ProviderUnavailable(LlmError::Timeout).into();
        assert_eq!(e.status, StatusCode::SERVICE_UNAVAILABLE);
        let e: ApiError = AgentError::EmptyConversation.into();
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
