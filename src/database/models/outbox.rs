use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use super::macros::string_enum;

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum OutboxStatus {
        Pending => "pending",
        Sent => "sent",
        Failed => "failed",
    }
}

/// What the teacher is told when a payment is approved. Also the body of the
/// manual resend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalNotice {
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub amount: i64,
    pub period: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub teacher_id: Uuid,
    pub channel: String,
    pub payload: Json<ApprovalNotice>, // JSONB
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

pub const SMS_CHANNEL: &str = "sms";

/// A new outbox row only becomes due for the dispatcher after this many
/// seconds, so the approving request makes the first attempt alone.
pub const FIRST_ATTEMPT_GRACE_SECONDS: i64 = 60;
