//! Payment arithmetic and edit rules.
//!
//! Everything here is pure: the services load a payment, run it through these
//! functions and persist whatever comes back. Amounts are whole IRR; hours
//! carry two decimals and products are rounded half-up to the rial.

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::models::{
    Department, PaymentStatus, SessionTotals, Teacher, TeacherPayment, UpdatePaymentInput,
    minutes_to_hours,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentRuleError {
    #[error("{field} must not be negative")]
    NegativeAmount { field: &'static str },

    #[error("totalHours must not be negative")]
    NegativeHours,

    #[error("A callern rate is required for callern and mixed department teachers")]
    MissingCallernRate,

    #[error("Final amount would be negative ({0})")]
    NegativeFinalAmount(i64),

    #[error("Cannot move payment from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Nothing to update: provide at least one of basePay, bonuses, deductions, totalHours, hourlyRate")]
    EmptyDraft,

    #[error("A {0} payment can no longer be edited")]
    NotEditable(PaymentStatus),

    #[error("Payment was modified by someone else (version {actual}, expected {expected})")]
    StaleVersion { expected: i32, actual: i32 },

    #[error("Payment amount changed since it was loaded ({actual}, expected {expected})")]
    StaleAmount { expected: i64, actual: i64 },

    #[error("Amount out of range")]
    Overflow,
}

type RuleResult<T> = Result<T, PaymentRuleError>;

/// `hours * rate`, rounded half-up to a whole rial.
pub fn pay_for_hours(hours: &BigDecimal, rate: i64) -> RuleResult<i64> {
    if *hours < BigDecimal::from(0) {
        return Err(PaymentRuleError::NegativeHours);
    }
    if rate < 0 {
        return Err(PaymentRuleError::NegativeAmount {
            field: "hourlyRate",
        });
    }

    let half = BigDecimal::from(1) / BigDecimal::from(2);
    let product = hours * BigDecimal::from(rate);
    (product + half)
        .with_scale(0)
        .to_i64()
        .ok_or(PaymentRuleError::Overflow)
}

/// Regular pay plus callern pay when both callern hours and rate are present.
pub fn base_pay(
    total_hours: &BigDecimal,
    hourly_rate: i64,
    callern_hours: Option<&BigDecimal>,
    callern_rate: Option<i64>,
) -> RuleResult<i64> {
    let regular = pay_for_hours(total_hours, hourly_rate)?;
    let callern = match (callern_hours, callern_rate) {
        (Some(hours), Some(rate)) => pay_for_hours(hours, rate)?,
        _ => 0,
    };

    regular.checked_add(callern).ok_or(PaymentRuleError::Overflow)
}

pub fn final_amount(base_pay: i64, bonuses: i64, deductions: i64) -> RuleResult<i64> {
    let amount = base_pay
        .checked_add(bonuses)
        .and_then(|sum| sum.checked_sub(deductions))
        .ok_or(PaymentRuleError::Overflow)?;

    if amount < 0 {
        return Err(PaymentRuleError::NegativeFinalAmount(amount));
    }
    Ok(amount)
}

pub fn ensure_transition(from: PaymentStatus, to: PaymentStatus) -> RuleResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(PaymentRuleError::InvalidTransition { from, to })
    }
}

/// Paid payments are final. Approved ones only when the deployment allows it.
pub fn ensure_editable(status: PaymentStatus, allow_approved: bool) -> RuleResult<()> {
    match status {
        PaymentStatus::Paid => Err(PaymentRuleError::NotEditable(status)),
        PaymentStatus::Approved if !allow_approved => Err(PaymentRuleError::NotEditable(status)),
        _ => Ok(()),
    }
}

/// Rate update validation. A regular teacher may still carry a callern rate.
pub fn validate_rates(
    department: Department,
    regular_rate: i64,
    callern_rate: Option<i64>,
) -> RuleResult<()> {
    if regular_rate < 0 {
        return Err(PaymentRuleError::NegativeAmount {
            field: "regularRate",
        });
    }
    if callern_rate.is_some_and(|rate| rate < 0) {
        return Err(PaymentRuleError::NegativeAmount {
            field: "callernRate",
        });
    }
    if department.requires_callern_rate() && callern_rate.is_none() {
        return Err(PaymentRuleError::MissingCallernRate);
    }
    Ok(())
}

/// The caller's view of a payment must still match what is stored.
pub fn check_expectations(
    payment: &TeacherPayment,
    expected_version: Option<i32>,
    expected_amount: Option<i64>,
) -> RuleResult<()> {
    if let Some(expected) = expected_version {
        if expected != payment.version {
            return Err(PaymentRuleError::StaleVersion {
                expected,
                actual: payment.version,
            });
        }
    }
    if let Some(expected) = expected_amount {
        if expected != payment.final_amount {
            return Err(PaymentRuleError::StaleAmount {
                expected,
                actual: payment.final_amount,
            });
        }
    }
    Ok(())
}

/// Field edits submitted for a payment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDraft {
    pub base_pay: Option<i64>,
    pub bonuses: Option<i64>,
    pub deductions: Option<i64>,
    pub total_hours: Option<BigDecimal>,
    pub hourly_rate: Option<i64>,
}

impl From<&UpdatePaymentInput> for PaymentDraft {
    fn from(input: &UpdatePaymentInput) -> Self {
        PaymentDraft {
            base_pay: input.base_pay,
            bonuses: input.bonuses,
            deductions: input.deductions,
            total_hours: input.total_hours.clone(),
            hourly_rate: input.hourly_rate,
        }
    }
}

impl PaymentDraft {
    pub fn is_empty(&self) -> bool {
        self.base_pay.is_none()
            && self.bonuses.is_none()
            && self.deductions.is_none()
            && self.total_hours.is_none()
            && self.hourly_rate.is_none()
    }

    pub fn validate(&self) -> RuleResult<()> {
        if self.is_empty() {
            return Err(PaymentRuleError::EmptyDraft);
        }

        let amounts = [
            ("basePay", self.base_pay),
            ("bonuses", self.bonuses),
            ("deductions", self.deductions),
            ("hourlyRate", self.hourly_rate),
        ];
        for (field, value) in amounts {
            if value.is_some_and(|v| v < 0) {
                return Err(PaymentRuleError::NegativeAmount { field });
            }
        }

        if self
            .total_hours
            .as_ref()
            .is_some_and(|hours| *hours < BigDecimal::from(0))
        {
            return Err(PaymentRuleError::NegativeHours);
        }
        Ok(())
    }

    /// Produce the edited payment. A change to hours or rate recomputes the
    /// base pay; otherwise a submitted base pay is a manual override. The
    /// final amount is always derived.
    pub fn apply(&self, payment: &TeacherPayment) -> RuleResult<TeacherPayment> {
        self.validate()?;

        let total_hours = self
            .total_hours
            .as_ref()
            .map(|hours| hours.round(2))
            .unwrap_or_else(|| payment.total_hours.clone());
        let hourly_rate = self.hourly_rate.unwrap_or(payment.hourly_rate);

        let rate_inputs_changed =
            total_hours != payment.total_hours || hourly_rate != payment.hourly_rate;
        let base = if rate_inputs_changed {
            base_pay(
                &total_hours,
                hourly_rate,
                payment.callern_hours.as_ref(),
                payment.callern_rate,
            )?
        } else {
            self.base_pay.unwrap_or(payment.base_pay)
        };

        let bonuses = self.bonuses.unwrap_or(payment.bonuses);
        let deductions = self.deductions.unwrap_or(payment.deductions);

        Ok(TeacherPayment {
            total_hours,
            hourly_rate,
            base_pay: base,
            bonuses,
            deductions,
            final_amount: final_amount(base, bonuses, deductions)?,
            ..payment.clone()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountChange {
    pub previous_amount: i64,
    pub new_amount: i64,
    pub difference: i64,
}

impl AmountChange {
    pub fn between(previous_amount: i64, new_amount: i64) -> Self {
        AmountChange {
            previous_amount,
            new_amount,
            difference: new_amount - previous_amount,
        }
    }
}

/// Rates used when none are configured on the teacher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDefaults {
    pub hourly_rate: i64,
    pub callern_rate: i64,
}

/// Rates a calculation run pays a teacher at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedRates {
    pub hourly_rate: i64,
    pub callern_rate: i64,
}

impl AppliedRates {
    pub fn for_teacher(teacher: &Teacher, use_individual_rates: bool, defaults: RateDefaults) -> Self {
        if use_individual_rates {
            AppliedRates {
                hourly_rate: teacher.hourly_rate,
                callern_rate: teacher.callern_rate.unwrap_or(defaults.callern_rate),
            }
        } else {
            AppliedRates {
                hourly_rate: defaults.hourly_rate,
                callern_rate: defaults.callern_rate,
            }
        }
    }
}

/// Refresh a payment from session aggregates, keeping its bonuses and
/// deductions. Callern hours are carried when the teacher worked callern
/// sessions or belongs to a callern department.
pub fn recompute(
    payment: &TeacherPayment,
    department: Department,
    totals: &SessionTotals,
    rates: AppliedRates,
) -> RuleResult<TeacherPayment> {
    let total_hours = minutes_to_hours(totals.regular_minutes);
    let (callern_hours, callern_rate) =
        if totals.callern_minutes > 0 || department.requires_callern_rate() {
            (
                Some(minutes_to_hours(totals.callern_minutes)),
                Some(rates.callern_rate),
            )
        } else {
            (None, None)
        };

    let base = base_pay(
        &total_hours,
        rates.hourly_rate,
        callern_hours.as_ref(),
        callern_rate,
    )?;

    Ok(TeacherPayment {
        total_sessions: i32::try_from(totals.session_count).map_err(|_| PaymentRuleError::Overflow)?,
        total_hours,
        hourly_rate: rates.hourly_rate,
        callern_hours,
        callern_rate,
        base_pay: base,
        final_amount: final_amount(base, payment.bonuses, payment.deductions)?,
        ..payment.clone()
    })
}
