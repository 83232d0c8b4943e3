use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static MONTH_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("valid month regex"));
static RANGE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})_to_(\d{4}-\d{2}-\d{2})$").expect("valid range regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Unrecognised period '{0}'")]
    Unrecognised(String),
    #[error("Invalid date in period '{0}'")]
    InvalidDate(String),
    #[error("Period starts after it ends: {0} > {1}")]
    Inverted(NaiveDate, NaiveDate),
    #[error("A custom period needs both startDate and endDate")]
    MissingCustomRange,
}

/// A billing window. `token` is the canonical label stored on payments:
/// `YYYY-MM` for calendar months, `YYYY-MM-DD_to_YYYY-MM-DD` for custom
/// ranges. Both bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub token: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Resolve a period selector. `current` and `previous` are relative to
    /// `today`; `custom` is only valid through [`Period::resolve_custom`].
    pub fn resolve(selector: &str, today: NaiveDate) -> Result<Self, PeriodError> {
        let selector = selector.trim();
        match selector {
            "current" => Self::month(today.year(), today.month()),
            "previous" => {
                let (year, month) = if today.month() == 1 {
                    (today.year() - 1, 12)
                } else {
                    (today.year(), today.month() - 1)
                };
                Self::month(year, month)
            }
            "custom" => Err(PeriodError::MissingCustomRange),
            _ => {
                if let Some(caps) = MONTH_TOKEN.captures(selector) {
                    let year = caps[1]
                        .parse()
                        .map_err(|_| PeriodError::InvalidDate(selector.to_string()))?;
                    let month = caps[2]
                        .parse()
                        .map_err(|_| PeriodError::InvalidDate(selector.to_string()))?;
                    return Self::month(year, month)
                        .map_err(|_| PeriodError::InvalidDate(selector.to_string()));
                }
                if let Some(caps) = RANGE_TOKEN.captures(selector) {
                    let start = parse_date(&caps[1], selector)?;
                    let end = parse_date(&caps[2], selector)?;
                    return Self::range(start, end);
                }
                Err(PeriodError::Unrecognised(selector.to_string()))
            }
        }
    }

    /// Resolve a selector that may be `custom` with explicit bounds.
    pub fn resolve_custom(
        selector: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, PeriodError> {
        if selector.trim() == "custom" {
            return match (start, end) {
                (Some(start), Some(end)) => Self::range(start, end),
                _ => Err(PeriodError::MissingCustomRange),
            };
        }
        Self::resolve(selector, today)
    }

    pub fn month(year: i32, month: u32) -> Result<Self, PeriodError> {
        let label = format!("{:04}-{:02}", year, month);
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| PeriodError::InvalidDate(label.clone()))?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let end = next_month
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| PeriodError::InvalidDate(label.clone()))?;

        Ok(Period {
            token: label,
            start,
            end,
        })
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::Inverted(start, end));
        }
        Ok(Period {
            token: format!("{}_to_{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")),
            start,
            end,
        })
    }

    /// First instant of the period (UTC).
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// First instant after the period (UTC), for half-open range queries.
    pub fn ends_before(&self) -> DateTime<Utc> {
        self.end
            .succ_opt()
            .unwrap_or(self.end)
            .and_time(NaiveTime::MIN)
            .and_utc()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.starts_at() && instant < self.ends_before()
    }
}

fn parse_date(raw: &str, selector: &str) -> Result<NaiveDate, PeriodError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| PeriodError::InvalidDate(selector.to_string()))
}
