use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::database::models::{
    Action, CreateTeacherInput, EntityType, RecordSessionInput, Teacher, TeacherRates,
    TeachingSession, UpdateRatesInput,
};
use crate::database::store::Store;
use crate::error::AppError;
use crate::services::activity_logger::{AuditContext, metadata};
use crate::services::events::{EventBus, PaymentEvent};
use crate::services::payroll::validate_rates;

const MAX_SESSION_MINUTES: i32 = 24 * 60;

#[derive(Clone)]
pub struct TeacherService {
    store: Arc<dyn Store>,
    events: EventBus,
}

impl TeacherService {
    pub fn new(store: Arc<dyn Store>, events: EventBus) -> Self {
        Self { store, events }
    }

    pub async fn rates(&self) -> Result<Vec<TeacherRates>, AppError> {
        Ok(self.store.list_teacher_rates().await?)
    }

    /// Change a teacher's rates. Existing payments keep the rates they were
    /// calculated with.
    pub async fn update_rates(
        &self,
        teacher_id: Uuid,
        input: UpdateRatesInput,
        audit: &AuditContext,
    ) -> Result<Teacher, AppError> {
        let teacher = self
            .store
            .find_teacher(teacher_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Teacher {} not found", teacher_id)))?;
        validate_rates(teacher.department, input.regular_rate, input.callern_rate)?;

        let activity = audit.activity(
            EntityType::TEACHER,
            teacher.id,
            Action::RATES_UPDATED,
            format!("Updated rates for {}", teacher.name),
            metadata([
                ("previousRegularRate", json!(teacher.hourly_rate)),
                ("previousCallernRate", json!(teacher.callern_rate)),
                ("regularRate", json!(input.regular_rate)),
                ("callernRate", json!(input.callern_rate)),
            ]),
        );

        let updated = self
            .store
            .update_rates(teacher.id, input.regular_rate, input.callern_rate, activity)
            .await?;

        log::info!(
            "Rates for teacher {} set to {} / {:?}",
            updated.id,
            updated.hourly_rate,
            updated.callern_rate
        );
        self.events
            .publish(PaymentEvent::RatesUpdated {
                teacher_id: updated.id,
            })
            .await;

        Ok(updated)
    }

    pub async fn create_teacher(
        &self,
        input: CreateTeacherInput,
        audit: &AuditContext,
    ) -> Result<Teacher, AppError> {
        if input.name.trim().is_empty() {
            return Err(AppError::BadRequest("name is required".to_string()));
        }
        validate_rates(input.department, input.hourly_rate, input.callern_rate)?;

        // The store assigns the id and points the activity at it.
        let activity = audit.activity(
            EntityType::TEACHER,
            Uuid::nil(),
            Action::CREATED,
            format!("Registered teacher {}", input.name.trim()),
            metadata([("department", json!(input.department))]),
        );

        let teacher = self
            .store
            .create_teacher(
                CreateTeacherInput {
                    name: input.name.trim().to_string(),
                    ..input
                },
                activity,
            )
            .await?;

        log::info!("Teacher {} registered ({})", teacher.id, teacher.department);
        self.events
            .publish(PaymentEvent::TeacherCreated {
                teacher_id: teacher.id,
            })
            .await;

        Ok(teacher)
    }

    pub async fn record_session(
        &self,
        teacher_id: Uuid,
        input: RecordSessionInput,
        audit: &AuditContext,
    ) -> Result<TeachingSession, AppError> {
        if input.duration_minutes <= 0 || input.duration_minutes > MAX_SESSION_MINUTES {
            return Err(AppError::BadRequest(format!(
                "durationMinutes must be between 1 and {}",
                MAX_SESSION_MINUTES
            )));
        }
        if input.rating.is_some_and(|r| !(1..=5).contains(&r)) {
            return Err(AppError::BadRequest(
                "rating must be between 1 and 5".to_string(),
            ));
        }

        let teacher = self
            .store
            .find_teacher(teacher_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Teacher {} not found", teacher_id)))?;
        if !teacher.active {
            return Err(AppError::BadRequest(format!(
                "{} is not an active teacher",
                teacher.name
            )));
        }

        let activity = audit.activity(
            EntityType::TEACHER,
            teacher.id,
            Action::SESSION_RECORDED,
            format!(
                "Recorded {} minute {} session for {}",
                input.duration_minutes, input.kind, teacher.name
            ),
            metadata([
                ("kind", json!(input.kind)),
                ("startedAt", json!(input.started_at)),
                ("completed", json!(input.completed)),
            ]),
        );

        let session = self
            .store
            .record_session(teacher.id, input, activity)
            .await?;

        self.events
            .publish(PaymentEvent::SessionRecorded {
                teacher_id: teacher.id,
            })
            .await;

        Ok(session)
    }
}
