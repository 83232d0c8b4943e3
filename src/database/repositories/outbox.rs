use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStore;
use crate::database::{
    models::{OutboxEntry, OutboxStatus},
    store::{OutboxStore, StoreError},
    utils::sql,
};

const OUTBOX_COLUMNS: &str = r#"
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
"#;

impl PgStore {
    /// Current state of a row whose guarded update matched nothing.
    async fn current_notification(&self, id: Uuid) -> Result<OutboxEntry> {
        let entry = sqlx::query_as::<_, OutboxEntry>(&sql(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM notification_outbox WHERE id = ?"
        )))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Notification {} not found", id)))?;

        Ok(entry)
    }
}

#[async_trait]
impl OutboxStore for PgStore {
    async fn due_notifications(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(&sql(&format!(
            r#"
            SELECT
                {OUTBOX_COLUMNS}
            FROM
                notification_outbox
            WHERE
                status = 'pending'
                AND next_attempt_at <= ?
            ORDER BY
                next_attempt_at
            LIMIT
                ?
            "#
        )))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn notifications_for_payment(&self, payment_id: Uuid) -> Result<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(&sql(&format!(
            r#"
            SELECT
                {OUTBOX_COLUMNS}
            FROM
                notification_outbox
            WHERE
                payment_id = ?
            ORDER BY
                created_at
            "#
        )))
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn mark_notification_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<OutboxEntry> {
        let updated = sqlx::query_as::<_, OutboxEntry>(&sql(&format!(
            r#"
            UPDATE
                notification_outbox
            SET
                status = ?,
                attempts = attempts + 1,
                last_error = NULL,
                sent_at = ?
            WHERE
                id = ?
                AND status = 'pending'
            RETURNING
                {OUTBOX_COLUMNS}
            "#
        )))
        .bind(OutboxStatus::Sent)
        .bind(sent_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(entry) => Ok(entry),
            None => self.current_notification(id).await,
        }
    }

    async fn mark_notification_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<OutboxEntry> {
        let status = match retry_at {
            Some(_) => OutboxStatus::Pending,
            None => OutboxStatus::Failed,
        };

        let updated = sqlx::query_as::<_, OutboxEntry>(&sql(&format!(
            r#"
            UPDATE
                notification_outbox
            SET
                status = ?,
                attempts = attempts + 1,
                last_error = ?,
                next_attempt_at = COALESCE(?, next_attempt_at)
            WHERE
                id = ?
                AND status = 'pending'
            RETURNING
                {OUTBOX_COLUMNS}
            "#
        )))
        .bind(status)
        .bind(error)
        .bind(retry_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(entry) => Ok(entry),
            None => self.current_notification(id).await,
        }
    }
}
