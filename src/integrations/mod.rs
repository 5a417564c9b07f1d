//! 外部协作方：邮件通知（SMTP）、Google Calendar 同步与 OAuth 凭据

pub mod email;
pub mod google;
pub mod oauth;

pub use email::{render_email, LogNotifier, NotificationKind, Notifier, NotifyError, SmtpNotifier};
pub use google::{DisabledGoogleCalendar, GoogleCalendar, GoogleCalendarClient, GoogleError};
pub use oauth::{ClientSecrets, StoredToken, TokenStore};
