//! Approval notifications.
//!
//! Approval writes an outbox row in the same transaction as the status
//! change. [`Notifier::deliver`] makes one attempt on a row; the request that
//! approved the payment calls it right away and the dispatcher task picks up
//! whatever is still pending on its next tick. New rows only become due after
//! a short grace period, so the dispatcher does not race the request for the
//! first attempt. Marking a row only changes it while it is still pending: a
//! late failure from a stale copy cannot put a sent row back in the queue.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::database::models::{Action, ApprovalNotice, EntityType, OutboxEntry, OutboxStatus};
use crate::database::store::Store;
use crate::services::activity_logger::{ActivityLogger, AuditContext, metadata};
use crate::services::events::{EventBus, PaymentEvent};

const DISPATCH_BATCH: i64 = 50;
const RETRY_BASE_SECONDS: i64 = 30;
const RETRY_CAP_SECONDS: i64 = 3600;

#[async_trait]
pub trait SmsGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, phone: &str, message: &str) -> Result<()>;
}

/// Writes messages to the log instead of a carrier. Default outside
/// production.
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, phone: &str, message: &str) -> Result<()> {
        log::info!("SMS to {}: {}", phone, message);
        Ok(())
    }
}

pub struct DisabledSmsGateway;

#[async_trait]
impl SmsGateway for DisabledSmsGateway {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn send(&self, _phone: &str, _message: &str) -> Result<()> {
        Err(anyhow!("SMS delivery is disabled"))
    }
}

pub fn gateway_from_config(config: &Config) -> Result<Arc<dyn SmsGateway>> {
    match config.sms_provider.trim().to_lowercase().as_str() {
        "log" => Ok(Arc::new(LogSmsGateway)),
        "disabled" => Ok(Arc::new(DisabledSmsGateway)),
        other => Err(anyhow!("Unknown SMS_PROVIDER '{}'", other)),
    }
}

/// `5550000` -> `5,550,000`.
pub fn format_amount(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

pub fn approval_message(notice: &ApprovalNotice, sender: &str) -> String {
    format!(
        "{}: Dear {}, your payment of {} IRR for {} has been approved.",
        sender,
        notice.teacher_name,
        format_amount(notice.amount),
        notice.period
    )
}

/// Backoff before retry number `attempts` (1-based): 30s doubling per
/// attempt, capped at an hour, plus up to 10% jitter.
pub fn retry_delay(attempts: i32) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
    let seconds = RETRY_BASE_SECONDS
        .saturating_mul(1_i64 << exponent)
        .min(RETRY_CAP_SECONDS);
    let jitter = rand::rng().random_range(0..=seconds / 10);
    Duration::seconds(seconds + jitter)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReport {
    pub status: OutboxStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn Store>,
    gateway: Arc<dyn SmsGateway>,
    events: EventBus,
    activity: ActivityLogger,
    sender: String,
    max_attempts: i32,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn SmsGateway>,
        events: EventBus,
        config: &Config,
    ) -> Self {
        Self {
            activity: ActivityLogger::new(store.clone()),
            store,
            gateway,
            events,
            sender: config.sms_sender.clone(),
            max_attempts: config.outbox_max_attempts,
        }
    }

    /// Send a notice straight to the teacher's phone.
    pub async fn send_direct(&self, notice: &ApprovalNotice) -> Result<()> {
        let teacher = self
            .store
            .find_teacher(notice.teacher_id)
            .await?
            .ok_or_else(|| anyhow!("Teacher {} not found", notice.teacher_id))?;
        let phone = teacher
            .phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| anyhow!("{} has no phone number on file", teacher.name))?;

        self.gateway
            .send(phone, &approval_message(notice, &self.sender))
            .await
    }

    /// One delivery attempt for an outbox row. Never fails: the outcome is
    /// recorded on the row and returned.
    pub async fn deliver(&self, entry: &OutboxEntry, audit: &AuditContext) -> NotificationReport {
        let notice = &entry.payload.0;
        let attempt = self.send_direct(notice).await;
        let now = Utc::now();

        match attempt {
            Ok(()) => {
                if let Err(err) = self.store.mark_notification_sent(entry.id, now).await {
                    log::error!("Failed to mark notification {} sent: {}", entry.id, err);
                }
                log::info!(
                    "Approval SMS sent for payment {} via {}",
                    entry.payment_id,
                    self.gateway.name()
                );
                self.activity
                    .log(audit.activity(
                        EntityType::PAYMENT,
                        entry.payment_id,
                        Action::NOTIFICATION_SENT,
                        format!("Approval SMS sent to {}", notice.teacher_name),
                        metadata([("attempt", json!(entry.attempts + 1))]),
                    ))
                    .await;

                NotificationReport {
                    status: OutboxStatus::Sent,
                    error: None,
                    next_attempt_at: None,
                }
            }
            Err(err) => {
                let message = err.to_string();
                let attempts = entry.attempts + 1;
                let retry_at = (attempts < self.max_attempts).then(|| now + retry_delay(attempts));

                log::warn!(
                    "Approval SMS for payment {} failed (attempt {}/{}): {}",
                    entry.payment_id,
                    attempts,
                    self.max_attempts,
                    message
                );
                match self
                    .store
                    .mark_notification_failed(entry.id, &message, retry_at)
                    .await
                {
                    Ok(stored) if stored.status == OutboxStatus::Sent => {
                        log::info!(
                            "Notification {} was delivered by another attempt, failure ignored",
                            entry.id
                        );
                        return NotificationReport {
                            status: OutboxStatus::Sent,
                            error: None,
                            next_attempt_at: None,
                        };
                    }
                    Ok(_) => {}
                    Err(err) => {
                        log::error!("Failed to record notification {} failure: {}", entry.id, err);
                    }
                }
                self.activity
                    .log(audit.activity(
                        EntityType::PAYMENT,
                        entry.payment_id,
                        Action::NOTIFICATION_FAILED,
                        format!("Approval SMS to {} failed: {}", notice.teacher_name, message),
                        metadata([
                            ("attempt", json!(attempts)),
                            ("error", json!(message)),
                            ("willRetry", json!(retry_at.is_some())),
                        ]),
                    ))
                    .await;
                self.events
                    .publish(PaymentEvent::NotificationFailed {
                        payment_id: entry.payment_id,
                        period: notice.period.clone(),
                    })
                    .await;

                NotificationReport {
                    status: if retry_at.is_some() {
                        OutboxStatus::Pending
                    } else {
                        OutboxStatus::Failed
                    },
                    error: Some(message),
                    next_attempt_at: retry_at,
                }
            }
        }
    }

    /// Attempt every row that is due. Returns how many were attempted.
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self.store.due_notifications(now, DISPATCH_BATCH).await?;
        if due.is_empty() {
            return Ok(0);
        }

        log::debug!("Dispatching {} due notifications", due.len());
        let audit = AuditContext::system();
        join_all(due.iter().map(|entry| self.deliver(entry, &audit))).await;
        Ok(due.len())
    }

    pub fn spawn_dispatcher(self: Arc<Self>, every: StdDuration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(err) = self.dispatch_due(Utc::now()).await {
                    log::error!("Outbox dispatch failed: {}", err);
                }
            }
        })
    }
}
