use anyhow::Result;
use async_trait::async_trait;

use super::{PgStore, activity::log_activity, map_duplicate};
use crate::database::{
    models::{AccountingSubmission, CreateActivityInput},
    store::ReportStore,
    utils::sql,
};

#[async_trait]
impl ReportStore for PgStore {
    async fn record_submission(
        &self,
        submission: &AccountingSubmission,
        activity: CreateActivityInput,
    ) -> Result<AccountingSubmission> {
        let mut tx = self.pool.begin().await?;

        let recorded = sqlx::query_as::<_, AccountingSubmission>(&sql(r#"
            INSERT INTO
                accounting_submissions (
                    tracking_id,
                    period,
                    payment_ids,
                    total_amount,
                    submitted_by,
                    submitted_at
                )
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING
                tracking_id,
                period,
                payment_ids,
                total_amount,
                submitted_by,
                submitted_at
        "#))
        .bind(&submission.tracking_id)
        .bind(&submission.period)
        .bind(&submission.payment_ids)
        .bind(submission.total_amount)
        .bind(submission.submitted_by)
        .bind(submission.submitted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_duplicate(e, || format!("Submission {}", submission.tracking_id)))?;

        log_activity(&mut tx, activity).await?;
        tx.commit().await?;

        Ok(recorded)
    }
}
