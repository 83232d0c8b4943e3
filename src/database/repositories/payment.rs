use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Postgres, Transaction, types::Json};
use uuid::Uuid;

use super::{PgStore, activity::log_activity, map_duplicate};
use crate::database::{
    models::{
        ApprovalNotice, CreateActivityInput, FIRST_ATTEMPT_GRACE_SECONDS, OutboxEntry,
        OutboxStatus, SMS_CHANNEL, TeacherPayment,
    },
    store::PaymentStore,
    utils::sql,
};

const PAYMENT_COLUMNS: &str = r#"
    id,
    teacher_id,
    teacher_name,
    period,
    total_sessions,
    total_hours,
    hourly_rate,
    callern_hours,
    callern_rate,
    base_pay,
    bonuses,
    deductions,
    final_amount,
    status,
    calculated_at,
    approved_at,
    approved_by,
    paid_at,
    version,
    created_at,
    updated_at
"#;

/// Compare-and-set write of every mutable payment column. Returns `None` when
/// the stored version is no longer `expected_version`.
async fn update_payment_row(
    tx: &mut Transaction<'_, Postgres>,
    payment: &TeacherPayment,
    expected_version: i32,
) -> Result<Option<TeacherPayment>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE
            teacher_payments
        SET
            teacher_name = ?,
            total_sessions = ?,
            total_hours = ?,
            hourly_rate = ?,
            callern_hours = ?,
            callern_rate = ?,
            base_pay = ?,
            bonuses = ?,
            deductions = ?,
            final_amount = ?,
            status = ?,
            calculated_at = ?,
            approved_at = ?,
            approved_by = ?,
            paid_at = ?,
            version = version + 1,
            updated_at = NOW()
        WHERE
            id = ?
            AND version = ?
        RETURNING {PAYMENT_COLUMNS}
        "#
    );

    sqlx::query_as::<_, TeacherPayment>(&sql(&query))
        .bind(&payment.teacher_name)
        .bind(payment.total_sessions)
        .bind(&payment.total_hours)
        .bind(payment.hourly_rate)
        .bind(&payment.callern_hours)
        .bind(payment.callern_rate)
        .bind(payment.base_pay)
        .bind(payment.bonuses)
        .bind(payment.deductions)
        .bind(payment.final_amount)
        .bind(payment.status)
        .bind(payment.calculated_at)
        .bind(payment.approved_at)
        .bind(payment.approved_by)
        .bind(payment.paid_at)
        .bind(payment.id)
        .bind(expected_version)
        .fetch_optional(&mut **tx)
        .await
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn list_payments(&self, period: &str) -> Result<Vec<TeacherPayment>> {
        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM
                teacher_payments
            WHERE
                period = ?
            ORDER BY
                teacher_name,
                id
            "#
        );

        let payments = sqlx::query_as::<_, TeacherPayment>(&sql(&query))
            .bind(period)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<TeacherPayment>> {
        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM
                teacher_payments
            WHERE
                id = ?
            "#
        );

        let payment = sqlx::query_as::<_, TeacherPayment>(&sql(&query))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn find_payment_for(
        &self,
        teacher_id: Uuid,
        period: &str,
    ) -> Result<Option<TeacherPayment>> {
        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM
                teacher_payments
            WHERE
                teacher_id = ?
                AND period = ?
            "#
        );

        let payment = sqlx::query_as::<_, TeacherPayment>(&sql(&query))
            .bind(teacher_id)
            .bind(period)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn insert_payment(
        &self,
        payment: &TeacherPayment,
        activity: CreateActivityInput,
    ) -> Result<TeacherPayment> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            r#"
            INSERT INTO
                teacher_payments ({PAYMENT_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );

        let inserted = sqlx::query_as::<_, TeacherPayment>(&sql(&query))
            .bind(payment.id)
            .bind(payment.teacher_id)
            .bind(&payment.teacher_name)
            .bind(&payment.period)
            .bind(payment.total_sessions)
            .bind(&payment.total_hours)
            .bind(payment.hourly_rate)
            .bind(&payment.callern_hours)
            .bind(payment.callern_rate)
            .bind(payment.base_pay)
            .bind(payment.bonuses)
            .bind(payment.deductions)
            .bind(payment.final_amount)
            .bind(payment.status)
            .bind(payment.calculated_at)
            .bind(payment.approved_at)
            .bind(payment.approved_by)
            .bind(payment.paid_at)
            .bind(payment.version)
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                map_duplicate(e, || {
                    format!(
                        "Payment for teacher {} in period {}",
                        payment.teacher_id, payment.period
                    )
                })
            })?;

        log_activity(&mut tx, activity).await?;
        tx.commit().await?;

        Ok(inserted)
    }

    async fn save_payment(
        &self,
        payment: &TeacherPayment,
        expected_version: i32,
        activity: CreateActivityInput,
    ) -> Result<Option<TeacherPayment>> {
        let mut tx = self.pool.begin().await?;

        // Dropping the transaction rolls it back
        let Some(saved) = update_payment_row(&mut tx, payment, expected_version).await? else {
            return Ok(None);
        };

        log_activity(&mut tx, activity).await?;
        tx.commit().await?;

        Ok(Some(saved))
    }

    async fn approve_payment(
        &self,
        payment: &TeacherPayment,
        expected_version: i32,
        notice: ApprovalNotice,
        activity: CreateActivityInput,
    ) -> Result<Option<(TeacherPayment, OutboxEntry)>> {
        let mut tx = self.pool.begin().await?;

        let Some(saved) = update_payment_row(&mut tx, payment, expected_version).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        let due_at = now + Duration::seconds(FIRST_ATTEMPT_GRACE_SECONDS);
        let entry = sqlx::query_as::<_, OutboxEntry>(&sql(r#"
            INSERT INTO
                notification_outbox (
                    id,
                    payment_id,
                    teacher_id,
                    channel,
                    payload,
                    status,
                    attempts,
                    next_attempt_at,
                    created_at
                )
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING
                id,
                payment_id,
                teacher_id,
                channel,
                payload,
                status,
                attempts,
                last_error,
                next_attempt_at,
                created_at,
                sent_at
        "#))
        .bind(Uuid::new_v4())
        .bind(saved.id)
        .bind(notice.teacher_id)
        .bind(SMS_CHANNEL)
        .bind(Json(notice))
        .bind(OutboxStatus::Pending)
        .bind(due_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        log_activity(&mut tx, activity).await?;
        tx.commit().await?;

        Ok(Some((saved, entry)))
    }

    async fn payment_history(&self, teacher_id: Uuid) -> Result<Vec<TeacherPayment>> {
        let query = format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM
                teacher_payments
            WHERE
                teacher_id = ?
            ORDER BY
                period DESC,
                created_at DESC
            "#
        );

        let payments = sqlx::query_as::<_, TeacherPayment>(&sql(&query))
            .bind(teacher_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }
}
