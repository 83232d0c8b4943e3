#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use fake::Fake;
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use teacher_payments::config::Config;
use teacher_payments::database::MemoryStore;
use teacher_payments::database::models::{
    AccountingSubmission, ApprovalNotice, CreateActivityInput, CreateTeacherInput, Department,
    OutboxEntry, PaymentActivity, Period, RecordSessionInput, SessionKind, SessionTotals, Teacher,
    TeacherPayment, TeacherRates, TeachingSession,
};
use teacher_payments::database::store::{
    ActivityStore, OutboxStore, PaymentStore, ReportStore, StoreError, TeacherStore,
};
use teacher_payments::handlers::shared::ApiResponse;
use teacher_payments::services::auth::encode_token;
use teacher_payments::services::{AuditContext, SmsGateway, StaffRole};
use teacher_payments::{AppState, Store};

/// Gateway double that records every message and fails on demand.
#[derive(Default)]
pub struct ScriptedSmsGateway {
    failing: AtomicBool,
    sent: Mutex<Vec<(String, String)>>,
}

impl ScriptedSmsGateway {
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsGateway for ScriptedSmsGateway {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn send(&self, phone: &str, message: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("carrier unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));
        Ok(())
    }
}

/// In-memory store that can stage a competing writer for the next call.
#[derive(Default)]
pub struct InterleavingStore {
    inner: MemoryStore,
    approve_race: AtomicBool,
    insert_failure: Mutex<Option<StoreError>>,
}

impl InterleavingStore {
    /// The next approval is beaten by an identical one committed first.
    pub fn race_next_approval(&self) {
        self.approve_race.store(true, Ordering::SeqCst);
    }

    /// The next payment insert fails with `error`.
    pub fn fail_next_insert(&self, error: StoreError) {
        *self.insert_failure.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl TeacherStore for InterleavingStore {
    async fn create_teacher(
        &self,
        input: CreateTeacherInput,
        activity: CreateActivityInput,
    ) -> Result<Teacher> {
        self.inner.create_teacher(input, activity).await
    }

    async fn find_teacher(&self, id: Uuid) -> Result<Option<Teacher>> {
        self.inner.find_teacher(id).await
    }

    async fn list_active_teachers(&self) -> Result<Vec<Teacher>> {
        self.inner.list_active_teachers().await
    }

    async fn list_teacher_rates(&self) -> Result<Vec<TeacherRates>> {
        self.inner.list_teacher_rates().await
    }

    async fn update_rates(
        &self,
        id: Uuid,
        hourly_rate: i64,
        callern_rate: Option<i64>,
        activity: CreateActivityInput,
    ) -> Result<Teacher> {
        self.inner
            .update_rates(id, hourly_rate, callern_rate, activity)
            .await
    }

    async fn record_session(
        &self,
        teacher_id: Uuid,
        input: RecordSessionInput,
        activity: CreateActivityInput,
    ) -> Result<TeachingSession> {
        self.inner.record_session(teacher_id, input, activity).await
    }

    async fn session_totals(&self, teacher_id: Uuid, period: &Period) -> Result<SessionTotals> {
        self.inner.session_totals(teacher_id, period).await
    }

    async fn list_sessions(
        &self,
        teacher_id: Uuid,
        period: &Period,
    ) -> Result<Vec<TeachingSession>> {
        self.inner.list_sessions(teacher_id, period).await
    }
}

#[async_trait]
impl PaymentStore for InterleavingStore {
    async fn list_payments(&self, period: &str) -> Result<Vec<TeacherPayment>> {
        self.inner.list_payments(period).await
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<TeacherPayment>> {
        self.inner.find_payment(id).await
    }

    async fn find_payment_for(
        &self,
        teacher_id: Uuid,
        period: &str,
    ) -> Result<Option<TeacherPayment>> {
        self.inner.find_payment_for(teacher_id, period).await
    }

    async fn insert_payment(
        &self,
        payment: &TeacherPayment,
        activity: CreateActivityInput,
    ) -> Result<TeacherPayment> {
        let staged = self.insert_failure.lock().unwrap().take();
        if let Some(error) = staged {
            return Err(error.into());
        }
        self.inner.insert_payment(payment, activity).await
    }

    async fn save_payment(
        &self,
        payment: &TeacherPayment,
        expected_version: i32,
        activity: CreateActivityInput,
    ) -> Result<Option<TeacherPayment>> {
        self.inner
            .save_payment(payment, expected_version, activity)
            .await
    }

    async fn approve_payment(
        &self,
        payment: &TeacherPayment,
        expected_version: i32,
        notice: ApprovalNotice,
        activity: CreateActivityInput,
    ) -> Result<Option<(TeacherPayment, OutboxEntry)>> {
        if self.approve_race.swap(false, Ordering::SeqCst) {
            self.inner
                .approve_payment(payment, expected_version, notice.clone(), activity.clone())
                .await?;
        }
        self.inner
            .approve_payment(payment, expected_version, notice, activity)
            .await
    }

    async fn payment_history(&self, teacher_id: Uuid) -> Result<Vec<TeacherPayment>> {
        self.inner.payment_history(teacher_id).await
    }
}

#[async_trait]
impl OutboxStore for InterleavingStore {
    async fn due_notifications(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxEntry>> {
        self.inner.due_notifications(now, limit).await
    }

    async fn notifications_for_payment(&self, payment_id: Uuid) -> Result<Vec<OutboxEntry>> {
        self.inner.notifications_for_payment(payment_id).await
    }

    async fn mark_notification_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<OutboxEntry> {
        self.inner.mark_notification_sent(id, sent_at).await
    }

    async fn mark_notification_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<OutboxEntry> {
        self.inner.mark_notification_failed(id, error, retry_at).await
    }
}

#[async_trait]
impl ActivityStore for InterleavingStore {
    async fn log_activity(&self, input: CreateActivityInput) -> Result<PaymentActivity> {
        self.inner.log_activity(input).await
    }

    async fn activity_for(&self, entity_id: Uuid) -> Result<Vec<PaymentActivity>> {
        self.inner.activity_for(entity_id).await
    }
}

#[async_trait]
impl ReportStore for InterleavingStore {
    async fn record_submission(
        &self,
        submission: &AccountingSubmission,
        activity: CreateActivityInput,
    ) -> Result<AccountingSubmission> {
        self.inner.record_submission(submission, activity).await
    }
}

pub struct TestContext {
    pub config: Config,
    pub store: Arc<InterleavingStore>,
    pub gateway: Arc<ScriptedSmsGateway>,
    pub state: AppState,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(Config::test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        setup_test_env();
        let store = Arc::new(InterleavingStore::default());
        let gateway = Arc::new(ScriptedSmsGateway::default());
        let state = AppState::new(
            config.clone(),
            store.clone() as Arc<dyn Store>,
            gateway.clone() as Arc<dyn SmsGateway>,
        )
        .await;

        TestContext {
            config,
            store,
            gateway,
            state,
        }
    }

    pub fn token(&self, role: StaffRole) -> String {
        encode_token(&self.config, Uuid::new_v4(), "Test Operator", role)
            .expect("Failed to issue test token")
    }

    pub fn manager_header(&self) -> (&'static str, String) {
        auth_header(&self.token(StaffRole::Manager))
    }

    pub fn admin_header(&self) -> (&'static str, String) {
        auth_header(&self.token(StaffRole::Admin))
    }

    pub fn staff_header(&self) -> (&'static str, String) {
        auth_header(&self.token(StaffRole::Staff))
    }

    pub async fn create_teacher(
        &self,
        department: Department,
        hourly_rate: i64,
        callern_rate: Option<i64>,
    ) -> Teacher {
        self.state
            .teachers
            .create_teacher(
                CreateTeacherInput {
                    name: Name().fake::<String>(),
                    phone: Some(PhoneNumber().fake::<String>()),
                    hourly_rate,
                    callern_rate,
                    department,
                },
                &AuditContext::system(),
            )
            .await
            .expect("Failed to create test teacher")
    }

    pub async fn record_session(
        &self,
        teacher: &Teacher,
        kind: SessionKind,
        started_at: DateTime<Utc>,
        duration_minutes: i32,
        rating: Option<i16>,
    ) {
        self.state
            .teachers
            .record_session(
                teacher.id,
                RecordSessionInput {
                    kind,
                    started_at,
                    duration_minutes,
                    completed: true,
                    rating,
                    student_name: Some(Name().fake::<String>()),
                },
                &AuditContext::system(),
            )
            .await
            .expect("Failed to record test session");
    }
}

/// A day inside September 2026, the period most tests bill.
pub fn september(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, day, hour, 0, 0).unwrap()
}

pub const SEPTEMBER: &str = "2026-09";

pub fn auth_header(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

pub fn assert_success_response<T>(body: &[u8]) -> T
where
    T: DeserializeOwned,
{
    let response: ApiResponse<T> =
        serde_json::from_slice(body).expect("Failed to parse JSON response");

    assert!(
        response.success,
        "Expected successful response but got error: {:?}",
        response.message
    );
    response.data.expect("Expected data in successful response")
}

pub fn setup_test_env() {
    let _ = env_logger::builder().is_test(true).try_init();
}
