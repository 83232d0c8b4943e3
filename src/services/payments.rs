use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::database::models::{
    AccountingReceipt, AccountingSubmission, Action, ApprovalNotice, CalculatePaymentsInput,
    CalculationSummary, EntityType, OutboxEntry, PaymentActivity, PaymentReport, PaymentStatus,
    Period, PeriodSummary, SendToAccountingInput, SkippedPayment, Teacher, TeacherPayment,
    TeachingSession, UpdatePaymentInput,
};
use crate::database::store::{Store, StoreError};
use crate::error::AppError;
use crate::services::activity_logger::{ActivityLogger, AuditContext, metadata};
use crate::services::cache::PaymentListCache;
use crate::services::events::{EventBus, PaymentEvent};
use crate::services::notifier::{NotificationReport, Notifier};
use crate::services::payroll::{
    AmountChange, AppliedRates, PaymentDraft, RateDefaults, check_expectations, ensure_editable,
    ensure_transition, recompute,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdateResult {
    pub payment: TeacherPayment,
    pub changes: AmountChange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResult {
    pub payment: TeacherPayment,
    pub already_approved: bool,
    pub notification: Option<NotificationReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaidResult {
    pub payment: TeacherPayment,
    pub already_paid: bool,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Resolve an optional `?period=` selector, defaulting to the current month.
pub fn resolve_period(selector: Option<&str>) -> Result<Period, AppError> {
    let selector = selector.map(str::trim).filter(|s| !s.is_empty());
    Ok(Period::resolve(selector.unwrap_or("current"), today())?)
}

/// `ACC-YYYYMMDD-XXXXXX`.
pub fn tracking_id(date: NaiveDate) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("ACC-{}-{}", date.format("%Y%m%d"), suffix.to_uppercase())
}

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn Store>,
    events: EventBus,
    cache: PaymentListCache,
    notifier: Notifier,
    activity: ActivityLogger,
    rate_defaults: RateDefaults,
    allow_approved_recalculation: bool,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn Store>,
        events: EventBus,
        cache: PaymentListCache,
        notifier: Notifier,
        config: &Config,
    ) -> Self {
        Self {
            activity: ActivityLogger::new(store.clone()),
            store,
            events,
            cache,
            notifier,
            rate_defaults: RateDefaults {
                hourly_rate: config.default_hourly_rate,
                callern_rate: config.default_callern_rate,
            },
            allow_approved_recalculation: config.allow_approved_recalculation,
        }
    }

    async fn load(&self, id: Uuid) -> Result<TeacherPayment, AppError> {
        self.store
            .find_payment(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", id)))
    }

    async fn load_teacher(&self, id: Uuid) -> Result<Teacher, AppError> {
        self.store
            .find_teacher(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Teacher {} not found", id)))
    }

    /// Payments for a period, ordered by teacher name.
    pub async fn list(&self, selector: Option<&str>) -> Result<Vec<TeacherPayment>, AppError> {
        let period = resolve_period(selector)?;
        if let Some(cached) = self.cache.get(&period.token).await {
            return Ok(cached.as_ref().clone());
        }

        let generation = self.cache.generation();
        let payments = self.store.list_payments(&period.token).await?;
        let cached = self.cache.put(&period.token, payments, generation).await;
        Ok(cached.as_ref().clone())
    }

    pub async fn summary(&self, selector: Option<&str>) -> Result<PeriodSummary, AppError> {
        let period = resolve_period(selector)?;
        let payments = self.list(Some(&period.token)).await?;
        Ok(PeriodSummary::from_payments(&period.token, &payments))
    }

    /// Compute or refresh every active teacher's payment for the period.
    pub async fn calculate(
        &self,
        input: CalculatePaymentsInput,
        audit: &AuditContext,
    ) -> Result<CalculationSummary, AppError> {
        let period =
            Period::resolve_custom(&input.period, input.start_date, input.end_date, today())?;
        let allow_approved = input.override_approved && self.allow_approved_recalculation;
        if input.override_approved && !self.allow_approved_recalculation {
            log::warn!(
                "overrideApproved requested for {} but approved recalculation is disabled",
                period.token
            );
        }

        let mut summary = CalculationSummary {
            period: period.token.clone(),
            created: 0,
            recalculated: 0,
            skipped: Vec::new(),
        };

        for teacher in self.store.list_active_teachers().await? {
            let skip = |reason: &str| SkippedPayment {
                teacher_id: teacher.id,
                teacher_name: teacher.name.clone(),
                reason: reason.to_string(),
            };

            let totals = self.store.session_totals(teacher.id, &period).await?;
            let rates =
                AppliedRates::for_teacher(&teacher, input.use_individual_rates, self.rate_defaults);
            let existing = self.store.find_payment_for(teacher.id, &period.token).await?;

            match existing {
                None if totals.session_count == 0 => {
                    summary.skipped.push(skip("no completed sessions"));
                }
                None => {
                    let now = Utc::now();
                    let blank = TeacherPayment {
                        id: Uuid::new_v4(),
                        teacher_id: teacher.id,
                        teacher_name: teacher.name.clone(),
                        period: period.token.clone(),
                        total_sessions: 0,
                        total_hours: 0.into(),
                        hourly_rate: rates.hourly_rate,
                        callern_hours: None,
                        callern_rate: None,
                        base_pay: 0,
                        bonuses: 0,
                        deductions: 0,
                        final_amount: 0,
                        status: PaymentStatus::Calculated,
                        calculated_at: Some(now),
                        approved_at: None,
                        approved_by: None,
                        paid_at: None,
                        version: 1,
                        created_at: now,
                        updated_at: now,
                    };
                    let payment = recompute(&blank, teacher.department, &totals, rates)?;
                    let activity = audit.activity(
                        EntityType::PAYMENT,
                        payment.id,
                        Action::CALCULATED,
                        format!(
                            "Calculated {} payment for {}: {}",
                            period.token, teacher.name, payment.final_amount
                        ),
                        metadata([
                            ("period", json!(period.token)),
                            ("finalAmount", json!(payment.final_amount)),
                            ("sessions", json!(payment.total_sessions)),
                        ]),
                    );

                    match self.store.insert_payment(&payment, activity).await {
                        Ok(_) => summary.created += 1,
                        Err(err)
                            if matches!(
                                err.downcast_ref::<StoreError>(),
                                Some(StoreError::Duplicate(_))
                            ) =>
                        {
                            // A concurrent run created it first.
                            summary.skipped.push(skip("calculated concurrently"));
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                Some(payment) if payment.status == PaymentStatus::Paid => {
                    summary.skipped.push(skip("already paid"));
                }
                Some(payment) if payment.status.is_approved() && !allow_approved => {
                    summary.skipped.push(skip("already approved"));
                }
                Some(payment) => {
                    let mut refreshed = recompute(&payment, teacher.department, &totals, rates)?;
                    if refreshed.status == PaymentStatus::Pending {
                        ensure_transition(refreshed.status, PaymentStatus::Calculated)?;
                        refreshed.status = PaymentStatus::Calculated;
                    }
                    if refreshed.calculated_at.is_none() {
                        refreshed.calculated_at = Some(Utc::now());
                    }

                    let activity = audit.activity(
                        EntityType::PAYMENT,
                        payment.id,
                        Action::RECALCULATED,
                        format!(
                            "Recalculated {} payment for {}: {} -> {}",
                            period.token, teacher.name, payment.final_amount, refreshed.final_amount
                        ),
                        metadata([
                            ("period", json!(period.token)),
                            ("previousAmount", json!(payment.final_amount)),
                            ("newAmount", json!(refreshed.final_amount)),
                        ]),
                    );

                    match self
                        .store
                        .save_payment(&refreshed, payment.version, activity)
                        .await?
                    {
                        Some(_) => summary.recalculated += 1,
                        None => summary.skipped.push(skip("modified concurrently")),
                    }
                }
            }
        }

        log::info!(
            "Calculated payments for {}: {} created, {} recalculated, {} skipped",
            summary.period,
            summary.created,
            summary.recalculated,
            summary.skipped.len()
        );
        self.events
            .publish(PaymentEvent::PaymentsCalculated {
                period: period.token,
            })
            .await;

        Ok(summary)
    }

    pub async fn update(
        &self,
        id: Uuid,
        input: UpdatePaymentInput,
        audit: &AuditContext,
    ) -> Result<PaymentUpdateResult, AppError> {
        let draft = PaymentDraft::from(&input);
        draft.validate()?;

        let payment = self.load(id).await?;
        ensure_editable(payment.status, self.allow_approved_recalculation)?;
        check_expectations(&payment, input.version, input.previous_amount)?;

        let edited = draft.apply(&payment)?;
        let changes = AmountChange::between(payment.final_amount, edited.final_amount);
        let activity = audit.activity(
            EntityType::PAYMENT,
            payment.id,
            Action::UPDATED,
            format!(
                "Updated payment for {} ({}): {} -> {}",
                payment.teacher_name, payment.period, changes.previous_amount, changes.new_amount
            ),
            metadata([
                ("previousAmount", json!(changes.previous_amount)),
                ("newAmount", json!(changes.new_amount)),
                ("difference", json!(changes.difference)),
                ("draft", json!(draft)),
            ]),
        );

        let saved = self
            .store
            .save_payment(&edited, payment.version, activity)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Payment was modified by someone else, reload and retry".into())
            })?;

        log::info!(
            "Payment {} updated: {} -> {}",
            saved.id,
            changes.previous_amount,
            changes.new_amount
        );
        self.events
            .publish(PaymentEvent::PaymentUpdated {
                payment_id: saved.id,
                period: saved.period.clone(),
            })
            .await;

        Ok(PaymentUpdateResult {
            payment: saved,
            changes,
        })
    }

    /// Approve a calculated payment and notify the teacher. The approval
    /// stands whatever happens to the notification.
    pub async fn approve(&self, id: Uuid, audit: &AuditContext) -> Result<ApprovalResult, AppError> {
        let payment = self.load(id).await?;
        if payment.status.is_approved() {
            log::info!("Payment {} already {}, approval skipped", id, payment.status);
            return Ok(ApprovalResult {
                payment,
                already_approved: true,
                notification: None,
            });
        }
        ensure_transition(payment.status, PaymentStatus::Approved)?;

        let now = Utc::now();
        let approved = TeacherPayment {
            status: PaymentStatus::Approved,
            approved_at: Some(now),
            approved_by: audit.actor_id,
            updated_at: now,
            ..payment.clone()
        };
        let notice = ApprovalNotice {
            teacher_id: payment.teacher_id,
            teacher_name: payment.teacher_name.clone(),
            amount: payment.final_amount,
            period: payment.period.clone(),
        };
        let activity = audit.activity(
            EntityType::PAYMENT,
            payment.id,
            Action::APPROVED,
            format!(
                "Approved {} payment for {}: {}",
                payment.period, payment.teacher_name, payment.final_amount
            ),
            metadata([("finalAmount", json!(payment.final_amount))]),
        );

        let Some((saved, entry)) = self
            .store
            .approve_payment(&approved, payment.version, notice, activity)
            .await?
        else {
            // Lost a race; a concurrent approval is still a no-op for this caller.
            let current = self.load(id).await?;
            if current.status.is_approved() {
                log::info!("Payment {} approved concurrently, approval skipped", id);
                return Ok(ApprovalResult {
                    payment: current,
                    already_approved: true,
                    notification: None,
                });
            }
            return Err(AppError::Conflict(
                "Payment was modified by someone else, reload and retry".into(),
            ));
        };

        log::info!("Payment {} approved", saved.id);
        self.events
            .publish(PaymentEvent::PaymentApproved {
                payment_id: saved.id,
                period: saved.period.clone(),
            })
            .await;

        let notification = self.notifier.deliver(&entry, audit).await;

        Ok(ApprovalResult {
            payment: saved,
            already_approved: false,
            notification: Some(notification),
        })
    }

    pub async fn mark_paid(&self, id: Uuid, audit: &AuditContext) -> Result<MarkPaidResult, AppError> {
        let payment = self.load(id).await?;
        if payment.status == PaymentStatus::Paid {
            return Ok(MarkPaidResult {
                payment,
                already_paid: true,
            });
        }
        ensure_transition(payment.status, PaymentStatus::Paid)?;

        let now = Utc::now();
        let paid = TeacherPayment {
            status: PaymentStatus::Paid,
            paid_at: Some(now),
            updated_at: now,
            ..payment.clone()
        };
        let activity = audit.activity(
            EntityType::PAYMENT,
            payment.id,
            Action::PAID,
            format!(
                "Marked {} payment for {} as paid",
                payment.period, payment.teacher_name
            ),
            None,
        );

        let saved = self
            .store
            .save_payment(&paid, payment.version, activity)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Payment was modified by someone else, reload and retry".into())
            })?;

        log::info!("Payment {} marked paid", saved.id);
        self.events
            .publish(PaymentEvent::PaymentPaid {
                payment_id: saved.id,
                period: saved.period.clone(),
            })
            .await;

        Ok(MarkPaidResult {
            payment: saved,
            already_paid: false,
        })
    }

    /// Manual resend. Never touches payment status.
    pub async fn send_approval_sms(
        &self,
        notice: ApprovalNotice,
        audit: &AuditContext,
    ) -> Result<(), AppError> {
        if notice.teacher_name.trim().is_empty() || notice.period.trim().is_empty() {
            return Err(AppError::BadRequest(
                "teacherName and period are required".to_string(),
            ));
        }
        if notice.amount < 0 {
            return Err(AppError::BadRequest("amount must not be negative".to_string()));
        }

        if let Err(err) = self.notifier.send_direct(&notice).await {
            log::warn!(
                "Manual approval SMS to teacher {} failed: {}",
                notice.teacher_id,
                err
            );
            return Err(AppError::NotificationFailed(format!(
                "Could not send SMS to {}: {}",
                notice.teacher_name, err
            )));
        }

        self.activity
            .log(audit.activity(
                EntityType::TEACHER,
                notice.teacher_id,
                Action::NOTIFICATION_SENT,
                format!("Approval SMS resent for {}", notice.period),
                metadata([
                    ("period", json!(notice.period)),
                    ("amount", json!(notice.amount)),
                ]),
            ))
            .await;
        Ok(())
    }

    /// Newest period first.
    pub async fn history(&self, teacher_id: Uuid) -> Result<Vec<TeacherPayment>, AppError> {
        self.load_teacher(teacher_id).await?;
        Ok(self.store.payment_history(teacher_id).await?)
    }

    pub async fn sessions(
        &self,
        teacher_id: Uuid,
        selector: &str,
    ) -> Result<Vec<TeachingSession>, AppError> {
        self.load_teacher(teacher_id).await?;
        let period = resolve_period(Some(selector))?;
        Ok(self.store.list_sessions(teacher_id, &period).await?)
    }

    pub async fn notifications(&self, payment_id: Uuid) -> Result<Vec<OutboxEntry>, AppError> {
        self.load(payment_id).await?;
        Ok(self.store.notifications_for_payment(payment_id).await?)
    }

    pub async fn activity(&self, payment_id: Uuid) -> Result<Vec<PaymentActivity>, AppError> {
        self.load(payment_id).await?;
        Ok(self.store.activity_for(payment_id).await?)
    }

    pub async fn report(&self, selector: Option<&str>) -> Result<PaymentReport, AppError> {
        let period = resolve_period(selector)?;
        let payments = self.list(Some(&period.token)).await?;
        Ok(PaymentReport {
            generated_at: Utc::now(),
            summary: PeriodSummary::from_payments(&period.token, &payments),
            period: period.token,
            payments,
        })
    }

    /// Record a hand-off to accounting. Amounts are taken from storage, not
    /// from the request.
    pub async fn send_to_accounting(
        &self,
        input: SendToAccountingInput,
        audit: &AuditContext,
    ) -> Result<AccountingReceipt, AppError> {
        let period = resolve_period(Some(&input.period))?;
        if input.payments.is_empty() {
            return Err(AppError::BadRequest(
                "No payments to send to accounting".to_string(),
            ));
        }

        let mut payment_ids = Vec::with_capacity(input.payments.len());
        let mut total_amount: i64 = 0;
        for reference in &input.payments {
            if payment_ids.contains(&reference.id) {
                continue;
            }
            let payment = self.load(reference.id).await?;
            if payment.period != period.token {
                return Err(AppError::BadRequest(format!(
                    "Payment {} belongs to {}, not {}",
                    payment.id, payment.period, period.token
                )));
            }
            total_amount = total_amount
                .checked_add(payment.final_amount)
                .ok_or_else(|| AppError::BadRequest("Total amount out of range".to_string()))?;
            payment_ids.push(payment.id);
        }

        let now = Utc::now();
        let submission = AccountingSubmission {
            tracking_id: tracking_id(now.date_naive()),
            period: period.token.clone(),
            payment_ids,
            total_amount,
            submitted_by: audit.actor_id.unwrap_or_else(Uuid::nil),
            submitted_at: now,
        };
        let activity = audit.activity(
            EntityType::ACCOUNTING,
            Uuid::new_v4(),
            Action::SENT_TO_ACCOUNTING,
            format!(
                "Sent {} payments for {} to accounting ({})",
                submission.payment_ids.len(),
                submission.period,
                submission.tracking_id
            ),
            metadata([
                ("trackingId", json!(submission.tracking_id)),
                ("totalAmount", json!(submission.total_amount)),
            ]),
        );

        let saved = self.store.record_submission(&submission, activity).await?;
        log::info!(
            "Submitted {} payments for {} to accounting as {}",
            saved.payment_ids.len(),
            saved.period,
            saved.tracking_id
        );
        self.events
            .publish(PaymentEvent::SubmittedToAccounting {
                period: saved.period.clone(),
                tracking_id: saved.tracking_id.clone(),
            })
            .await;

        Ok(AccountingReceipt {
            tracking_id: saved.tracking_id,
            payment_count: saved.payment_ids.len(),
            total_amount: saved.total_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn tracking_ids_are_dated_and_upper_case() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let pattern = Regex::new(r"^ACC-20261019-[A-Z0-9]{6}$").unwrap();
        for _ in 0..20 {
            assert!(pattern.is_match(&tracking_id(date)));
        }
    }

    #[test]
    fn blank_selector_means_current_month() {
        let period = resolve_period(Some("  ")).unwrap();
        assert_eq!(period, resolve_period(None).unwrap());
        assert!(resolve_period(Some("soon")).is_err());
    }
}
