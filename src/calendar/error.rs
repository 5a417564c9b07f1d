//! 日历服务错误

use thiserror::Error;

use crate::integrations::{GoogleError, NotifyError};
use crate::tools::ToolError;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Google Calendar error: {0}")]
    Google(#[from] GoogleError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

impl From<CalendarError> for ToolError {
    fn from(e: CalendarError) -> Self {
        match e {
            CalendarError::NotFound(_) => ToolError::NotFound(e.to_string()),
            CalendarError::InvalidInput(msg) => ToolError::InvalidArguments(msg),
            other => ToolError::Failed(other.to_string()),
        }
    }
}
