use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Audit trail row. Written in the same transaction as the change it records.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentActivity {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub description: String,
    pub metadata: Option<serde_json::Value>, // JSONB
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityInput {
    pub actor_id: Option<Uuid>,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub description: String,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[allow(non_snake_case)]
pub mod EntityType {
    pub const PAYMENT: &str = "teacher_payment";
    pub const TEACHER: &str = "teacher";
    pub const ACCOUNTING: &str = "accounting_submission";
}

#[allow(non_snake_case)]
pub mod Action {
    pub const CREATED: &str = "created";
    pub const CALCULATED: &str = "calculated";
    pub const RECALCULATED: &str = "recalculated";
    pub const UPDATED: &str = "updated";
    pub const APPROVED: &str = "approved";
    pub const PAID: &str = "paid";
    pub const RATES_UPDATED: &str = "rates_updated";
    pub const SESSION_RECORDED: &str = "session_recorded";
    pub const NOTIFICATION_SENT: &str = "notification_sent";
    pub const NOTIFICATION_FAILED: &str = "notification_failed";
    pub const SENT_TO_ACCOUNTING: &str = "sent_to_accounting";
}
