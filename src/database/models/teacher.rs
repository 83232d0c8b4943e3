use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;

string_enum! {
    /// Which kinds of teaching a teacher is billed for.
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "lowercase")]
    pub enum Department {
        Regular => "regular",
        Callern => "callern",
        Both => "both",
    }
}

impl Department {
    /// `callern` and `both` teachers are paid for standby sessions and must
    /// carry a callern rate.
    pub fn requires_callern_rate(self) -> bool {
        matches!(self, Department::Callern | Department::Both)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub hourly_rate: i64,         // BIGINT, IRR
    pub callern_rate: Option<i64>, // BIGINT, IRR
    pub department: Department,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rate listing row with the read-only session rollups.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRates {
    pub id: Uuid,
    pub name: String,
    pub department: Department,
    pub hourly_rate: i64,
    pub callern_rate: Option<i64>,
    pub total_sessions: i64,
    pub total_hours: BigDecimal,
    pub performance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeacherInput {
    pub name: String,
    pub phone: Option<String>,
    pub hourly_rate: i64,
    pub callern_rate: Option<i64>,
    pub department: Department,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRatesInput {
    pub regular_rate: i64,
    pub callern_rate: Option<i64>,
}
