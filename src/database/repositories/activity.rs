use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::PgStore;
use crate::database::{
    models::{CreateActivityInput, PaymentActivity},
    store::ActivityStore,
    utils::sql,
};

/// Log a new activity inside the caller's transaction
pub async fn log_activity(
    tx: &mut Transaction<'_, Postgres>,
    request: CreateActivityInput,
) -> Result<PaymentActivity, sqlx::Error> {
    let metadata_json = request
        .metadata
        .map(|m| serde_json::to_value(&m).unwrap_or_default());

    let activity = sqlx::query_as::<_, PaymentActivity>(&sql(r#"
        INSERT INTO
            payment_activity (
                actor_id,
                entity_type,
                entity_id,
                action,
                description,
                metadata,
                ip_address,
                user_agent
            )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING
            id,
            actor_id,
            entity_type,
            entity_id,
            action,
            description,
            metadata,
            ip_address,
            user_agent,
            created_at
    "#))
    .bind(request.actor_id)
    .bind(request.entity_type)
    .bind(request.entity_id)
    .bind(request.action)
    .bind(request.description)
    .bind(metadata_json)
    .bind(request.ip_address)
    .bind(request.user_agent)
    .fetch_one(&mut **tx)
    .await?;

    Ok(activity)
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn log_activity(&self, input: CreateActivityInput) -> Result<PaymentActivity> {
        let mut tx = self.pool.begin().await?;
        let activity = log_activity(&mut tx, input).await?;
        tx.commit().await?;
        Ok(activity)
    }

    async fn activity_for(&self, entity_id: Uuid) -> Result<Vec<PaymentActivity>> {
        let activity = sqlx::query_as::<_, PaymentActivity>(&sql(r#"
            SELECT
                id,
                actor_id,
                entity_type,
                entity_id,
                action,
                description,
                metadata,
                ip_address,
                user_agent,
                created_at
            FROM
                payment_activity
            WHERE
                entity_id = ?
            ORDER BY
                created_at DESC,
                id DESC
        "#))
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(activity)
    }
}
