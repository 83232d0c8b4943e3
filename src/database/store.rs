//! Storage seams for the payment workflow.
//!
//! Every mutation takes the audit record it must be written with, so an
//! implementation can commit the change and its activity row together.
//! Payment writes are compare-and-set on `version`: they return `None` when
//! the stored row has moved on since it was read.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{
    AccountingSubmission, ApprovalNotice, CreateActivityInput, CreateTeacherInput, OutboxEntry,
    PaymentActivity, Period, RecordSessionInput, SessionTotals, Teacher, TeacherPayment,
    TeacherRates, TeachingSession,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("{0}")]
    NotFound(String),
}

#[async_trait]
pub trait TeacherStore: Send + Sync {
    async fn create_teacher(
        &self,
        input: CreateTeacherInput,
        activity: CreateActivityInput,
    ) -> Result<Teacher>;

    async fn find_teacher(&self, id: Uuid) -> Result<Option<Teacher>>;

    async fn list_active_teachers(&self) -> Result<Vec<Teacher>>;

    async fn list_teacher_rates(&self) -> Result<Vec<TeacherRates>>;

    async fn update_rates(
        &self,
        id: Uuid,
        hourly_rate: i64,
        callern_rate: Option<i64>,
        activity: CreateActivityInput,
    ) -> Result<Teacher>;

    async fn record_session(
        &self,
        teacher_id: Uuid,
        input: RecordSessionInput,
        activity: CreateActivityInput,
    ) -> Result<TeachingSession>;

    /// Completed sessions only.
    async fn session_totals(&self, teacher_id: Uuid, period: &Period) -> Result<SessionTotals>;

    /// Completed sessions only, oldest first.
    async fn list_sessions(&self, teacher_id: Uuid, period: &Period)
    -> Result<Vec<TeachingSession>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn list_payments(&self, period: &str) -> Result<Vec<TeacherPayment>>;

    async fn find_payment(&self, id: Uuid) -> Result<Option<TeacherPayment>>;

    async fn find_payment_for(&self, teacher_id: Uuid, period: &str)
    -> Result<Option<TeacherPayment>>;

    /// Fails with [`StoreError::Duplicate`] when the teacher already has a
    /// payment for the period.
    async fn insert_payment(
        &self,
        payment: &TeacherPayment,
        activity: CreateActivityInput,
    ) -> Result<TeacherPayment>;

    async fn save_payment(
        &self,
        payment: &TeacherPayment,
        expected_version: i32,
        activity: CreateActivityInput,
    ) -> Result<Option<TeacherPayment>>;

    /// Writes the approved payment and queues its notification atomically.
    async fn approve_payment(
        &self,
        payment: &TeacherPayment,
        expected_version: i32,
        notice: ApprovalNotice,
        activity: CreateActivityInput,
    ) -> Result<Option<(TeacherPayment, OutboxEntry)>>;

    /// Newest period first.
    async fn payment_history(&self, teacher_id: Uuid) -> Result<Vec<TeacherPayment>>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn due_notifications(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxEntry>>;

    async fn notifications_for_payment(&self, payment_id: Uuid) -> Result<Vec<OutboxEntry>>;

    /// Both mark operations only change a `pending` row. Otherwise they
    /// return the row as stored, so a late attempt cannot undo a delivery.
    async fn mark_notification_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<OutboxEntry>;

    /// Records a failed attempt. `retry_at` of `None` gives up on the entry.
    async fn mark_notification_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<OutboxEntry>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn log_activity(&self, input: CreateActivityInput) -> Result<PaymentActivity>;

    /// Newest first.
    async fn activity_for(&self, entity_id: Uuid) -> Result<Vec<PaymentActivity>>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn record_submission(
        &self,
        submission: &AccountingSubmission,
        activity: CreateActivityInput,
    ) -> Result<AccountingSubmission>;
}

/// Everything the services need from storage.
pub trait Store: TeacherStore + PaymentStore + OutboxStore + ActivityStore + ReportStore {}

impl<T> Store for T where T: TeacherStore + PaymentStore + OutboxStore + ActivityStore + ReportStore
{}
