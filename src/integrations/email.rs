//! 邮件通知：提醒、邀请、变更、取消
//!
//! SmtpNotifier 通过 STARTTLS 发送 HTML 邮件；未配置账号时使用 LogNotifier，只记日志不发信。

use async_trait::async_trait;
use chrono_tz::Tz;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::Event;
use crate::config::EmailSection;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Email credentials not configured")]
    NotConfigured,

    #[error("Invalid email address '{0}'")]
    Address(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Transport(String),
}

/// 通知类型
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Reminder,
    Invitation,
    Update,
    Cancellation,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Reminder => "reminder",
            NotificationKind::Invitation => "invitation",
            NotificationKind::Update => "update",
            NotificationKind::Cancellation => "cancellation",
        }
    }
}

/// 通知发送 trait
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        event: &Event,
        recipient: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifyError>;
}

/// 渲染后的邮件
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// 按通知类型渲染主题与 HTML 正文；时间按 tz 显示
pub fn render_email(event: &Event, kind: NotificationKind, tz: Tz) -> RenderedEmail {
    let (prefix, heading, accent, background, intro) = match kind {
        NotificationKind::Reminder => (
            "Reminder",
            "Event Reminder",
            "#3b82f6",
            "#f3f4f6",
            "This is a reminder for your upcoming event:",
        ),
        NotificationKind::Invitation => (
            "Invitation",
            "You're Invited!",
            "#10b981",
            "#ecfdf5",
            "You've been invited to the following event:",
        ),
        NotificationKind::Update => (
            "Updated",
            "Event Updated",
            "#f59e0b",
            "#fef9c3",
            "The following event has been updated:",
        ),
        NotificationKind::Cancellation => (
            "Cancelled",
            "Event Cancelled",
            "#ef4444",
            "#fee2e2",
            "The following event has been cancelled:",
        ),
    };

    let start = event.start_time.with_timezone(&tz);
    let end = event.end_time.with_timezone(&tz);
    let title = escape_html(&event.title);
    let duration = match kind {
        NotificationKind::Cancellation => String::new(),
        _ => format!(
            "<p><strong>Duration:</strong> {} - {}</p>",
            start.format("%I:%M %p"),
            end.format("%I:%M %p")
        ),
    };
    let location = event
        .location
        .as_deref()
        .filter(|l| !l.is_empty())
        .map(|l| format!("<p><strong>Location:</strong> {}</p>", escape_html(l)))
        .unwrap_or_default();

    let html = format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; color: #333;">
    <h2 style="color: {accent};">{heading}</h2>
    <p>{intro}</p>
    <div style="background: {background}; padding: 15px; border-radius: 8px; margin: 10px 0;">
      <h3 style="margin: 0;">{title}</h3>
      <p><strong>When:</strong> {when}</p>
      {duration}
      {location}
    </div>
    <p style="color: #6b7280; font-size: 12px;">Sent from AI Calendar</p>
  </body>
</html>"#,
        when = start.format("%B %d, %Y at %I:%M %p %Z"),
    );

    RenderedEmail {
        subject: format!("{prefix}: {}", event.title),
        html,
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// SMTP 发送（STARTTLS + 账号密码登录）
pub struct SmtpNotifier {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    tz: Tz,
}

impl SmtpNotifier {
    pub fn from_config(cfg: &EmailSection, tz: Tz) -> Result<Self, NotifyError> {
        let (user, password) = match (&cfg.user, &cfg.password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u.clone(), p.clone()),
            _ => return Err(NotifyError::NotConfigured),
        };
        let from: Mailbox = user
            .parse()
            .map_err(|_| NotifyError::Address(user.clone()))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_server)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(cfg.smtp_port)
            .credentials(Credentials::new(user, password))
            .build();
        Ok(Self { from, transport, tz })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(
        &self,
        event: &Event,
        recipient: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifyError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|_| NotifyError::Address(recipient.to_string()))?;
        let rendered = render_email(event, kind, self.tz);
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(rendered.subject)
            .header(ContentType::TEXT_HTML)
            .body(rendered.html)
            .map_err(|e| NotifyError::Build(e.to_string()))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        tracing::info!(recipient, kind = kind.as_str(), event_id = %event.id, "email sent");
        Ok(())
    }
}

/// 未配置 SMTP 时的占位实现：记录日志并返回 NotConfigured
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        event: &Event,
        recipient: &str,
        kind: NotificationKind,
    ) -> Result<(), NotifyError> {
        tracing::warn!(
            recipient,
            kind = kind.as_str(),
            event_id = %event.id,
            "email credentials not configured, notification skipped"
        );
        Err(NotifyError::NotConfigured)
    }
}
