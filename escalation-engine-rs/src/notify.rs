// escalation-engine-rs/src/notify.rs
//
// Notification Dispatcher: fans an escalation event out to every
// configured channel independently. A failing channel is logged and
// never prevents the remaining channels or fails the cycle.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{ErrorPattern, EscalationRecord, HealthSnapshot, Priority};

/// Failures raised by a single channel delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid mailbox address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Email(#[from] lettre::error::Error),
}

/// SMTP submission settings for the email channel.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

/// Explicit channel configuration handed to the dispatcher at
/// construction. Every channel is independently optional; an
/// unconfigured channel is silently skipped.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub chat_webhook: Option<String>,
    pub email: Option<SmtpConfig>,
    pub webhook: Option<String>,
    /// Bound on every outbound call so a stuck channel cannot stall
    /// the scheduler.
    pub timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            chat_webhook: None,
            email: None,
            webhook: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl ChannelConfig {
    pub fn from_env() -> Self {
        let chat_webhook = std::env::var("CHAT_WEBHOOK_URL").ok();
        let webhook = std::env::var("ESCALATION_WEBHOOK_URL").ok();

        let email = std::env::var("SMTP_SERVER").ok().map(|server| SmtpConfig {
            server,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(587),
            username: std::env::var("EMAIL_USERNAME").unwrap_or_default(),
            password: std::env::var("EMAIL_PASSWORD").unwrap_or_default(),
            from: std::env::var("FROM_EMAIL").unwrap_or_default(),
            to: std::env::var("TO_EMAILS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        });

        let timeout = std::env::var("NOTIFY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Self {
            chat_webhook,
            email,
            webhook,
            timeout,
        }
    }
}

/// Outbound channel identity, for reporting and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Chat,
    Email,
    Webhook,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Chat => f.write_str("chat"),
            Channel::Email => f.write_str("email"),
            Channel::Webhook => f.write_str("webhook"),
        }
    }
}

/// The abstract escalation event carried to every channel.
#[derive(Debug, Clone, Serialize)]
pub struct EscalationNotice {
    pub escalation_id: Uuid,
    pub priority: Priority,
    pub agent_id: String,
    pub message: String,
    pub occurrences: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub urgent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overdue_hours: Option<f64>,
}

impl EscalationNotice {
    /// Notice for a freshly created escalation.
    pub fn created(record: &EscalationRecord, pattern: &ErrorPattern) -> Self {
        Self {
            escalation_id: record.id,
            priority: record.priority,
            agent_id: pattern.agent_id.clone(),
            message: pattern.message.clone(),
            occurrences: pattern.occurrences,
            first_seen: pattern.first_seen,
            last_seen: pattern.last_seen,
            urgent: false,
            overdue_hours: None,
        }
    }

    /// Urgent notice for an escalation whose SLA has lapsed.
    pub fn overdue(record: &EscalationRecord, new_priority: Priority, now: DateTime<Utc>) -> Self {
        let overdue_hours = (now - record.due_at).num_seconds() as f64 / 3600.0;
        Self {
            escalation_id: record.id,
            priority: new_priority,
            agent_id: String::new(),
            message: format!(
                "escalation {} missed its {} SLA",
                record.id, record.priority
            ),
            occurrences: 0,
            first_seen: record.escalated_at,
            last_seen: record.due_at,
            urgent: true,
            overdue_hours: Some(overdue_hours),
        }
    }

    fn subject(&self) -> String {
        if self.urgent {
            format!("URGENT escalation {} - {} priority", self.escalation_id, self.priority)
        } else {
            format!("Escalation {} - {} priority", self.escalation_id, self.priority)
        }
    }

    fn body(&self) -> String {
        format!(
            "Escalation: {}\nPriority: {}\nAgent: {}\nOccurrences: {}\nFirst seen: {}\nLast seen: {}\n\n{}\n",
            self.escalation_id,
            self.priority,
            self.agent_id,
            self.occurrences,
            self.first_seen.to_rfc3339(),
            self.last_seen.to_rfc3339(),
            self.message,
        )
    }
}

/// Daily roll-up of the current health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub pending_escalations: i64,
    pub recent_red_errors: i64,
    pub recent_failures: i64,
    pub avg_execution_ms: Option<f64>,
}

impl DailySummary {
    pub fn from_snapshot(date: NaiveDate, snapshot: &HealthSnapshot) -> Self {
        Self {
            date,
            pending_escalations: snapshot.pending_escalations,
            recent_red_errors: snapshot.recent_red_errors,
            recent_failures: snapshot.recent_failures,
            avg_execution_ms: snapshot.avg_execution_ms,
        }
    }
}

/// Per-dispatch accounting of which channels were attempted.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub sent: Vec<Channel>,
    pub failed: Vec<(Channel, NotifyError)>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.sent.len() + self.failed.len()
    }

    fn record(&mut self, channel: Channel, result: Result<(), NotifyError>) {
        match result {
            Ok(()) => {
                debug!(channel = %channel, "notification sent");
                self.sent.push(channel);
            }
            Err(err) => {
                warn!(channel = %channel, error = %err, "notification delivery failed");
                self.failed.push((channel, err));
            }
        }
    }
}

/// Delivers escalation events to the configured channels. Delivery is
/// at-most-once per channel per event; there is no retry and no
/// dead-letter queue.
pub struct NotificationDispatcher {
    config: ChannelConfig,
    client: reqwest::Client,
}

impl NotificationDispatcher {
    pub fn new(config: ChannelConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Attempt every configured channel. Infallible by design: each
    /// channel failure is captured in the report.
    pub async fn dispatch(&self, notice: &EscalationNotice) -> DispatchReport {
        let mut report = DispatchReport::default();

        if let Some(url) = &self.config.chat_webhook {
            let payload = json!({
                "event_type": "escalation",
                "text": notice.subject(),
                "data": notice,
            });
            report.record(Channel::Chat, self.post_json(url, &payload).await);
        }

        if let Some(smtp) = &self.config.email {
            let result = self
                .send_email(smtp, &notice.subject(), &notice.body())
                .await;
            report.record(Channel::Email, result);
        }

        if let Some(url) = &self.config.webhook {
            let payload = json!({
                "event_type": "escalation",
                "timestamp": Utc::now(),
                "data": notice,
            });
            report.record(Channel::Webhook, self.post_json(url, &payload).await);
        }

        report
    }

    /// Send the daily summary through the same channel set.
    pub async fn send_summary(&self, summary: &DailySummary) -> DispatchReport {
        let mut report = DispatchReport::default();
        let subject = format!("Daily escalation summary for {}", summary.date);
        let payload = json!({
            "event_type": "daily_summary",
            "text": subject,
            "data": summary,
        });

        if let Some(url) = &self.config.chat_webhook {
            report.record(Channel::Chat, self.post_json(url, &payload).await);
        }
        if let Some(smtp) = &self.config.email {
            let body = format!(
                "Pending escalations: {}\nRed errors (last hour): {}\nFailed operations (last hour): {}\nAvg execution: {}\n",
                summary.pending_escalations,
                summary.recent_red_errors,
                summary.recent_failures,
                summary
                    .avg_execution_ms
                    .map(|ms| format!("{ms:.1} ms"))
                    .unwrap_or_else(|| "n/a".to_string()),
            );
            report.record(Channel::Email, self.send_email(smtp, &subject, &body).await);
        }
        if let Some(url) = &self.config.webhook {
            report.record(Channel::Webhook, self.post_json(url, &payload).await);
        }

        report
    }

    async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotifyError> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }
        Ok(())
    }

    async fn send_email(
        &self,
        smtp: &SmtpConfig,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        let mut builder = Message::builder()
            .from(smtp.from.parse::<Mailbox>()?)
            .subject(subject);
        for to in &smtp.to {
            builder = builder.to(to.parse::<Mailbox>()?);
        }
        let message = builder.body(body.to_string())?;

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.server)?
                .port(smtp.port)
                .credentials(Credentials::new(
                    smtp.username.clone(),
                    smtp.password.clone(),
                ))
                .timeout(Some(self.config.timeout))
                .build();

        mailer.send(message).await?;
        Ok(())
    }
}
