use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PaymentStatus, TeacherPayment};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub period: String,
    pub payment_count: usize,
    pub by_status: BTreeMap<String, usize>,
    pub total_hours: String,
    pub total_base_pay: i64,
    pub total_bonuses: i64,
    pub total_deductions: i64,
    pub total_final_amount: i64,
}

impl PeriodSummary {
    pub fn from_payments(period: &str, payments: &[TeacherPayment]) -> Self {
        let mut by_status: BTreeMap<String, usize> = PaymentStatus::ALL
            .iter()
            .map(|status| (status.to_string(), 0))
            .collect();
        let mut total_hours = bigdecimal::BigDecimal::from(0);

        for payment in payments {
            *by_status.entry(payment.status.to_string()).or_default() += 1;
            total_hours = total_hours + &payment.total_hours;
            if let Some(hours) = &payment.callern_hours {
                total_hours = total_hours + hours;
            }
        }

        PeriodSummary {
            period: period.to_string(),
            payment_count: payments.len(),
            by_status,
            total_hours: total_hours.round(2).to_string(),
            total_base_pay: payments.iter().map(|p| p.base_pay).sum(),
            total_bonuses: payments.iter().map(|p| p.bonuses).sum(),
            total_deductions: payments.iter().map(|p| p.deductions).sum(),
            total_final_amount: payments.iter().map(|p| p.final_amount).sum(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReport {
    pub generated_at: DateTime<Utc>,
    pub period: String,
    pub summary: PeriodSummary,
    pub payments: Vec<TeacherPayment>,
}

/// A payment as the admin UI holds it. Extra fields in the body are ignored;
/// amounts are re-read from storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingPaymentRef {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendToAccountingInput {
    pub period: String,
    pub payments: Vec<AccountingPaymentRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountingSubmission {
    pub tracking_id: String,
    pub period: String,
    pub payment_ids: Vec<Uuid>, // UUID[]
    pub total_amount: i64,
    pub submitted_by: Uuid,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingReceipt {
    pub tracking_id: String,
    pub payment_count: usize,
    pub total_amount: i64,
}
