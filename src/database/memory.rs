use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{
    AccountingSubmission, ApprovalNotice, CreateActivityInput, CreateTeacherInput,
    FIRST_ATTEMPT_GRACE_SECONDS, OutboxEntry, OutboxStatus, PaymentActivity, Period,
    RecordSessionInput, SMS_CHANNEL, SessionKind, SessionTotals, Teacher, TeacherPayment,
    TeacherRates, TeachingSession, minutes_to_hours,
};
use crate::database::store::{
    ActivityStore, OutboxStore, PaymentStore, ReportStore, StoreError, TeacherStore,
};

#[derive(Default)]
struct MemoryState {
    teachers: HashMap<Uuid, Teacher>,
    sessions: Vec<TeachingSession>,
    payments: HashMap<Uuid, TeacherPayment>,
    outbox: Vec<OutboxEntry>,
    activity: Vec<PaymentActivity>,
    submissions: Vec<AccountingSubmission>,
}

impl MemoryState {
    fn push_activity(&mut self, input: CreateActivityInput) -> PaymentActivity {
        let activity = PaymentActivity {
            id: Uuid::new_v4(),
            actor_id: input.actor_id,
            entity_type: input.entity_type,
            entity_id: input.entity_id,
            action: input.action,
            description: input.description,
            metadata: input
                .metadata
                .map(|m| serde_json::to_value(m).unwrap_or_default()),
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            created_at: Utc::now(),
        };
        self.activity.push(activity.clone());
        activity
    }

    /// Compare-and-set write shared by every payment mutation.
    fn swap_payment(
        &mut self,
        payment: &TeacherPayment,
        expected_version: i32,
    ) -> Option<TeacherPayment> {
        let stored = self.payments.get_mut(&payment.id)?;
        if stored.version != expected_version {
            return None;
        }

        let mut updated = payment.clone();
        updated.version = expected_version + 1;
        updated.created_at = stored.created_at;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Some(updated)
    }

    fn completed_sessions<'a>(
        &'a self,
        teacher_id: Uuid,
        period: &'a Period,
    ) -> impl Iterator<Item = &'a TeachingSession> + 'a {
        self.sessions.iter().filter(move |s| {
            s.teacher_id == teacher_id && s.completed && period.contains(s.started_at)
        })
    }

    fn outbox_entry_mut(&mut self, id: Uuid) -> Result<&mut OutboxEntry> {
        self.outbox
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Notification {} not found", id)).into())
    }
}

/// Process-local store. Each call takes the state lock once, so multi-record
/// writes are atomic with respect to other callers.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TeacherStore for MemoryStore {
    async fn create_teacher(
        &self,
        input: CreateTeacherInput,
        mut activity: CreateActivityInput,
    ) -> Result<Teacher> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let teacher = Teacher {
            id: Uuid::new_v4(),
            name: input.name,
            phone: input.phone,
            hourly_rate: input.hourly_rate,
            callern_rate: input.callern_rate,
            department: input.department,
            active: true,
            created_at: now,
            updated_at: now,
        };
        state.teachers.insert(teacher.id, teacher.clone());
        activity.entity_id = teacher.id;
        state.push_activity(activity);
        Ok(teacher)
    }

    async fn find_teacher(&self, id: Uuid) -> Result<Option<Teacher>> {
        Ok(self.state.read().await.teachers.get(&id).cloned())
    }

    async fn list_active_teachers(&self) -> Result<Vec<Teacher>> {
        let state = self.state.read().await;
        let mut teachers: Vec<Teacher> = state
            .teachers
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect();
        teachers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(teachers)
    }

    async fn list_teacher_rates(&self) -> Result<Vec<TeacherRates>> {
        let state = self.state.read().await;
        let mut rates: Vec<TeacherRates> = state
            .teachers
            .values()
            .map(|teacher| {
                let completed: Vec<&TeachingSession> = state
                    .sessions
                    .iter()
                    .filter(|s| s.teacher_id == teacher.id && s.completed)
                    .collect();
                let minutes: i64 = completed.iter().map(|s| s.duration_minutes as i64).sum();
                let ratings: Vec<f64> = completed
                    .iter()
                    .filter_map(|s| s.rating.map(f64::from))
                    .collect();
                let performance = if ratings.is_empty() {
                    None
                } else {
                    Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
                };

                TeacherRates {
                    id: teacher.id,
                    name: teacher.name.clone(),
                    department: teacher.department,
                    hourly_rate: teacher.hourly_rate,
                    callern_rate: teacher.callern_rate,
                    total_sessions: completed.len() as i64,
                    total_hours: minutes_to_hours(minutes),
                    performance,
                }
            })
            .collect();
        rates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rates)
    }

    async fn update_rates(
        &self,
        id: Uuid,
        hourly_rate: i64,
        callern_rate: Option<i64>,
        activity: CreateActivityInput,
    ) -> Result<Teacher> {
        let mut state = self.state.write().await;
        let teacher = state
            .teachers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Teacher {} not found", id)))?;
        teacher.hourly_rate = hourly_rate;
        teacher.callern_rate = callern_rate;
        teacher.updated_at = Utc::now();
        let teacher = teacher.clone();
        state.push_activity(activity);
        Ok(teacher)
    }

    async fn record_session(
        &self,
        teacher_id: Uuid,
        input: RecordSessionInput,
        activity: CreateActivityInput,
    ) -> Result<TeachingSession> {
        let mut state = self.state.write().await;
        if !state.teachers.contains_key(&teacher_id) {
            return Err(StoreError::NotFound(format!("Teacher {} not found", teacher_id)).into());
        }
        let session = TeachingSession {
            id: Uuid::new_v4(),
            teacher_id,
            kind: input.kind,
            started_at: input.started_at,
            duration_minutes: input.duration_minutes,
            completed: input.completed,
            rating: input.rating,
            student_name: input.student_name,
            created_at: Utc::now(),
        };
        state.sessions.push(session.clone());
        state.push_activity(activity);
        Ok(session)
    }

    async fn session_totals(&self, teacher_id: Uuid, period: &Period) -> Result<SessionTotals> {
        let state = self.state.read().await;
        let mut totals = SessionTotals::default();
        for session in state.completed_sessions(teacher_id, period) {
            totals.session_count += 1;
            match session.kind {
                SessionKind::Regular => totals.regular_minutes += session.duration_minutes as i64,
                SessionKind::Callern => totals.callern_minutes += session.duration_minutes as i64,
            }
        }
        Ok(totals)
    }

    async fn list_sessions(
        &self,
        teacher_id: Uuid,
        period: &Period,
    ) -> Result<Vec<TeachingSession>> {
        let state = self.state.read().await;
        let mut sessions: Vec<TeachingSession> =
            state.completed_sessions(teacher_id, period).cloned().collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn list_payments(&self, period: &str) -> Result<Vec<TeacherPayment>> {
        let state = self.state.read().await;
        let mut payments: Vec<TeacherPayment> = state
            .payments
            .values()
            .filter(|p| p.period == period)
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.teacher_name.cmp(&b.teacher_name).then(a.id.cmp(&b.id)));
        Ok(payments)
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<TeacherPayment>> {
        Ok(self.state.read().await.payments.get(&id).cloned())
    }

    async fn find_payment_for(
        &self,
        teacher_id: Uuid,
        period: &str,
    ) -> Result<Option<TeacherPayment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .find(|p| p.teacher_id == teacher_id && p.period == period)
            .cloned())
    }

    async fn insert_payment(
        &self,
        payment: &TeacherPayment,
        activity: CreateActivityInput,
    ) -> Result<TeacherPayment> {
        let mut state = self.state.write().await;
        let duplicate = state
            .payments
            .values()
            .any(|p| p.teacher_id == payment.teacher_id && p.period == payment.period);
        if duplicate || state.payments.contains_key(&payment.id) {
            return Err(StoreError::Duplicate(format!(
                "Payment for teacher {} in period {}",
                payment.teacher_id, payment.period
            ))
            .into());
        }
        state.payments.insert(payment.id, payment.clone());
        state.push_activity(activity);
        Ok(payment.clone())
    }

    async fn save_payment(
        &self,
        payment: &TeacherPayment,
        expected_version: i32,
        activity: CreateActivityInput,
    ) -> Result<Option<TeacherPayment>> {
        let mut state = self.state.write().await;
        let saved = state.swap_payment(payment, expected_version);
        if saved.is_some() {
            state.push_activity(activity);
        }
        Ok(saved)
    }

    async fn approve_payment(
        &self,
        payment: &TeacherPayment,
        expected_version: i32,
        notice: ApprovalNotice,
        activity: CreateActivityInput,
    ) -> Result<Option<(TeacherPayment, OutboxEntry)>> {
        let mut state = self.state.write().await;
        let Some(saved) = state.swap_payment(payment, expected_version) else {
            return Ok(None);
        };

        let now = Utc::now();
        let entry = OutboxEntry {
            id: Uuid::new_v4(),
            payment_id: saved.id,
            teacher_id: notice.teacher_id,
            channel: SMS_CHANNEL.to_string(),
            payload: Json(notice),
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            next_attempt_at: now + Duration::seconds(FIRST_ATTEMPT_GRACE_SECONDS),
            created_at: now,
            sent_at: None,
        };
        state.outbox.push(entry.clone());
        state.push_activity(activity);

        Ok(Some((saved, entry)))
    }

    async fn payment_history(&self, teacher_id: Uuid) -> Result<Vec<TeacherPayment>> {
        let state = self.state.read().await;
        let mut payments: Vec<TeacherPayment> = state
            .payments
            .values()
            .filter(|p| p.teacher_id == teacher_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| {
            b.period
                .cmp(&a.period)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(payments)
    }
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn due_notifications(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxEntry>> {
        let state = self.state.read().await;
        let mut due: Vec<OutboxEntry> = state
            .outbox
            .iter()
            .filter(|e| e.status == OutboxStatus::Pending && e.next_attempt_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|e| e.next_attempt_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn notifications_for_payment(&self, payment_id: Uuid) -> Result<Vec<OutboxEntry>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .filter(|e| e.payment_id == payment_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<OutboxEntry> {
        let mut state = self.state.write().await;
        let entry = state.outbox_entry_mut(id)?;
        if entry.status != OutboxStatus::Pending {
            return Ok(entry.clone());
        }
        entry.attempts += 1;
        entry.status = OutboxStatus::Sent;
        entry.sent_at = Some(sent_at);
        entry.last_error = None;
        Ok(entry.clone())
    }

    async fn mark_notification_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<OutboxEntry> {
        let mut state = self.state.write().await;
        let entry = state.outbox_entry_mut(id)?;
        if entry.status != OutboxStatus::Pending {
            return Ok(entry.clone());
        }
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        match retry_at {
            Some(at) => {
                entry.status = OutboxStatus::Pending;
                entry.next_attempt_at = at;
            }
            None => entry.status = OutboxStatus::Failed,
        }
        Ok(entry.clone())
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn log_activity(&self, input: CreateActivityInput) -> Result<PaymentActivity> {
        Ok(self.state.write().await.push_activity(input))
    }

    async fn activity_for(&self, entity_id: Uuid) -> Result<Vec<PaymentActivity>> {
        let state = self.state.read().await;
        Ok(state
            .activity
            .iter()
            .rev()
            .filter(|a| a.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn record_submission(
        &self,
        submission: &AccountingSubmission,
        activity: CreateActivityInput,
    ) -> Result<AccountingSubmission> {
        let mut state = self.state.write().await;
        if state
            .submissions
            .iter()
            .any(|s| s.tracking_id == submission.tracking_id)
        {
            return Err(
                StoreError::Duplicate(format!("Submission {}", submission.tracking_id)).into(),
            );
        }
        state.submissions.push(submission.clone());
        state.push_activity(activity);
        Ok(submission.clone())
    }
}
