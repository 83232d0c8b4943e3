use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{PgStore, activity::log_activity};
use crate::database::{
    models::{
        CreateActivityInput, CreateTeacherInput, Period, RecordSessionInput, SessionTotals,
        Teacher, TeacherRates, TeachingSession,
    },
    store::{StoreError, TeacherStore},
    utils::sql,
};

#[async_trait]
impl TeacherStore for PgStore {
    async fn create_teacher(
        &self,
        input: CreateTeacherInput,
        mut activity: CreateActivityInput,
    ) -> Result<Teacher> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let teacher = sqlx::query_as::<_, Teacher>(&sql(r#"
            INSERT INTO
                teachers (
                    id,
                    name,
                    phone,
                    hourly_rate,
                    callern_rate,
                    department,
                    active,
                    created_at,
                    updated_at
                )
            VALUES (?, ?, ?, ?, ?, ?, TRUE, ?, ?)
            RETURNING
                id,
                name,
                phone,
                hourly_rate,
                callern_rate,
                department,
                active,
                created_at,
                updated_at
        "#))
        .bind(Uuid::new_v4())
        .bind(input.name)
        .bind(input.phone)
        .bind(input.hourly_rate)
        .bind(input.callern_rate)
        .bind(input.department)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        activity.entity_id = teacher.id;
        log_activity(&mut tx, activity).await?;
        tx.commit().await?;

        Ok(teacher)
    }

    async fn find_teacher(&self, id: Uuid) -> Result<Option<Teacher>> {
        let teacher = sqlx::query_as::<_, Teacher>(&sql(r#"
            SELECT
                id,
                name,
                phone,
                hourly_rate,
                callern_rate,
                department,
                active,
                created_at,
                updated_at
            FROM
                teachers
            WHERE
                id = ?
        "#))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(teacher)
    }

    async fn list_active_teachers(&self) -> Result<Vec<Teacher>> {
        let teachers = sqlx::query_as::<_, Teacher>(&sql(r#"
            SELECT
                id,
                name,
                phone,
                hourly_rate,
                callern_rate,
                department,
                active,
                created_at,
                updated_at
            FROM
                teachers
            WHERE
                active
            ORDER BY
                name,
                id
        "#))
        .fetch_all(&self.pool)
        .await?;

        Ok(teachers)
    }

    async fn list_teacher_rates(&self) -> Result<Vec<TeacherRates>> {
        let rates = sqlx::query_as::<_, TeacherRates>(&sql(r#"
            SELECT
                t.id,
                t.name,
                t.department,
                t.hourly_rate,
                t.callern_rate,
                COUNT(s.id) AS total_sessions,
                ROUND(COALESCE(SUM(s.duration_minutes), 0)::NUMERIC / 60, 2) AS total_hours,
                AVG(s.rating)::FLOAT8 AS performance
            FROM
                teachers t
                LEFT JOIN teaching_sessions s ON s.teacher_id = t.id
                AND s.completed
            GROUP BY
                t.id
            ORDER BY
                t.name
        "#))
        .fetch_all(&self.pool)
        .await?;

        Ok(rates)
    }

    async fn update_rates(
        &self,
        id: Uuid,
        hourly_rate: i64,
        callern_rate: Option<i64>,
        activity: CreateActivityInput,
    ) -> Result<Teacher> {
        let mut tx = self.pool.begin().await?;

        let teacher = sqlx::query_as::<_, Teacher>(&sql(r#"
            UPDATE
                teachers
            SET
                hourly_rate = ?,
                callern_rate = ?,
                updated_at = ?
            WHERE
                id = ?
            RETURNING
                id,
                name,
                phone,
                hourly_rate,
                callern_rate,
                department,
                active,
                created_at,
                updated_at
        "#))
        .bind(hourly_rate)
        .bind(callern_rate)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Teacher {} not found", id)))?;

        log_activity(&mut tx, activity).await?;
        tx.commit().await?;

        Ok(teacher)
    }

    async fn record_session(
        &self,
        teacher_id: Uuid,
        input: RecordSessionInput,
        activity: CreateActivityInput,
    ) -> Result<TeachingSession> {
        let mut tx = self.pool.begin().await?;

        let session = sqlx::query_as::<_, TeachingSession>(&sql(r#"
            INSERT INTO
                teaching_sessions (
                    id,
                    teacher_id,
                    kind,
                    started_at,
                    duration_minutes,
                    completed,
                    rating,
                    student_name,
                    created_at
                )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id,
                teacher_id,
                kind,
                started_at,
                duration_minutes,
                completed,
                rating,
                student_name,
                created_at
        "#))
        .bind(Uuid::new_v4())
        .bind(teacher_id)
        .bind(input.kind)
        .bind(input.started_at)
        .bind(input.duration_minutes)
        .bind(input.completed)
        .bind(input.rating)
        .bind(input.student_name)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        log_activity(&mut tx, activity).await?;
        tx.commit().await?;

        Ok(session)
    }

    async fn session_totals(&self, teacher_id: Uuid, period: &Period) -> Result<SessionTotals> {
        let totals = sqlx::query_as::<_, SessionTotals>(&sql(r#"
            SELECT
                COUNT(*) AS session_count,
                COALESCE(SUM(duration_minutes) FILTER (WHERE kind = 'regular'), 0)::BIGINT AS regular_minutes,
                COALESCE(SUM(duration_minutes) FILTER (WHERE kind = 'callern'), 0)::BIGINT AS callern_minutes
            FROM
                teaching_sessions
            WHERE
                teacher_id = ?
                AND completed
                AND started_at >= ?
                AND started_at < ?
        "#))
        .bind(teacher_id)
        .bind(period.starts_at())
        .bind(period.ends_before())
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }

    async fn list_sessions(
        &self,
        teacher_id: Uuid,
        period: &Period,
    ) -> Result<Vec<TeachingSession>> {
        let sessions = sqlx::query_as::<_, TeachingSession>(&sql(r#"
            SELECT
                id,
                teacher_id,
                kind,
                started_at,
                duration_minutes,
                completed,
                rating,
                student_name,
                created_at
            FROM
                teaching_sessions
            WHERE
                teacher_id = ?
                AND completed
                AND started_at >= ?
                AND started_at < ?
            ORDER BY
                started_at
        "#))
        .bind(teacher_id)
        .bind(period.starts_at())
        .bind(period.ends_before())
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }
}
