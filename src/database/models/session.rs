use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;

string_enum! {
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    #[serde(rename_all = "lowercase")]
    pub enum SessionKind {
        Regular => "regular",
        Callern => "callern",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeachingSession {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub kind: SessionKind,
    pub started_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub completed: bool,
    pub rating: Option<i16>,
    pub student_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSessionInput {
    pub kind: SessionKind,
    pub started_at: DateTime<Utc>,
    pub duration_minutes: i32,
    #[serde(default = "default_completed")]
    pub completed: bool,
    pub rating: Option<i16>,
    pub student_name: Option<String>,
}

fn default_completed() -> bool {
    true
}

/// Completed-session aggregates for one teacher over one period.
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct SessionTotals {
    pub session_count: i64,
    pub regular_minutes: i64,
    pub callern_minutes: i64,
}

/// Session minutes as hours, rounded to two decimals (the precision hours are
/// stored and paid at).
pub fn minutes_to_hours(minutes: i64) -> bigdecimal::BigDecimal {
    (bigdecimal::BigDecimal::from(minutes) / bigdecimal::BigDecimal::from(60)).round(2)
}
