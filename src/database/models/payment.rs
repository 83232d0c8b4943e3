use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;

string_enum! {
    /// Payment lifecycle. Variants are declared in lifecycle order so the
    /// derived `Ord` matches the workflow.
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[serde(rename_all = "lowercase")]
    pub enum PaymentStatus {
        Pending => "pending",
        Calculated => "calculated",
        Approved => "approved",
        Paid => "paid",
    }
}

impl PaymentStatus {
    /// The only transitions are single forward steps.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Calculated)
                | (PaymentStatus::Calculated, PaymentStatus::Approved)
                | (PaymentStatus::Approved, PaymentStatus::Paid)
        )
    }

    pub fn is_approved(self) -> bool {
        self >= PaymentStatus::Approved
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPayment {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub period: String,
    pub total_sessions: i32,
    pub total_hours: BigDecimal,           // NUMERIC(10,2)
    pub hourly_rate: i64,                  // BIGINT, IRR
    pub callern_hours: Option<BigDecimal>, // NUMERIC(10,2)
    pub callern_rate: Option<i64>,
    pub base_pay: i64,
    pub bonuses: i64,
    pub deductions: i64,
    pub final_amount: i64,
    pub status: PaymentStatus,
    pub calculated_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatePaymentsInput {
    pub period: String,
    #[serde(default = "default_use_individual_rates")]
    pub use_individual_rates: bool,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub override_approved: bool,
}

fn default_use_individual_rates() -> bool {
    true
}

/// Body of the edit/recalculate endpoint. `previous_amount` and `version`
/// are the caller's view of the record and are checked before writing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentInput {
    pub base_pay: Option<i64>,
    pub bonuses: Option<i64>,
    pub deductions: Option<i64>,
    pub total_hours: Option<BigDecimal>,
    pub hourly_rate: Option<i64>,
    pub previous_amount: Option<i64>,
    pub version: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedPayment {
    pub teacher_id: Uuid,
    pub teacher_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationSummary {
    pub period: String,
    pub created: usize,
    pub recalculated: usize,
    pub skipped: Vec<SkippedPayment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentQuery {
    pub period: Option<String>,
}
