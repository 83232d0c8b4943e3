use std::str::FromStr;

use anyhow::Result;
use bigdecimal::BigDecimal;
use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use sqlx::PgPool;
use uuid::Uuid;

use teacher_payments::database::PgStore;
use teacher_payments::database::models::{
    AccountingSubmission, Action, ApprovalNotice, CreateActivityInput, CreateTeacherInput,
    Department, EntityType, OutboxStatus, PaymentStatus, Period, RecordSessionInput, SessionKind,
    Teacher, TeacherPayment,
};
use teacher_payments::database::store::{
    ActivityStore, OutboxStore, PaymentStore, ReportStore, StoreError, TeacherStore,
};
use teacher_payments::services::AuditContext;

fn activity(entity_type: &str, entity_id: Uuid, action: &str) -> CreateActivityInput {
    AuditContext::system().activity(entity_type, entity_id, action, action.to_string(), None)
}

async fn teacher(store: &PgStore, department: Department) -> Result<Teacher> {
    store
        .create_teacher(
            CreateTeacherInput {
                name: "Sara Ahmadi".to_string(),
                phone: Some("09120000000".to_string()),
                hourly_rate: 450_000,
                callern_rate: Some(300_000),
                department,
            },
            activity(EntityType::TEACHER, Uuid::nil(), Action::CREATED),
        )
        .await
}

fn calculated(teacher: &Teacher, period: &str) -> TeacherPayment {
    let now = Utc::now();
    TeacherPayment {
        id: Uuid::new_v4(),
        teacher_id: teacher.id,
        teacher_name: teacher.name.clone(),
        period: period.to_string(),
        total_sessions: 6,
        total_hours: BigDecimal::from_str("12.00").unwrap(),
        hourly_rate: 450_000,
        callern_hours: None,
        callern_rate: None,
        base_pay: 5_400_000,
        bonuses: 0,
        deductions: 0,
        final_amount: 5_400_000,
        status: PaymentStatus::Calculated,
        calculated_at: Some(now),
        approved_at: None,
        approved_by: None,
        paid_at: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

fn notice(payment: &TeacherPayment) -> ApprovalNotice {
    ApprovalNotice {
        teacher_id: payment.teacher_id,
        teacher_name: payment.teacher_name.clone(),
        amount: payment.final_amount,
        period: payment.period.clone(),
    }
}

#[sqlx::test]
async fn test_session_totals_split_regular_and_callern(pool: PgPool) -> Result<()> {
    let store = PgStore::new(pool);
    let teacher = teacher(&store, Department::Both).await?;
    let september = Period::month(2026, 9)?;

    let sessions = [
        (SessionKind::Regular, 2, 90, true),
        (SessionKind::Regular, 3, 30, true),
        (SessionKind::Callern, 4, 45, true),
        (SessionKind::Callern, 5, 60, false),
    ];
    for (kind, day, minutes, completed) in sessions {
        store
            .record_session(
                teacher.id,
                RecordSessionInput {
                    kind,
                    started_at: Utc.with_ymd_and_hms(2026, 9, day, 10, 0, 0).unwrap(),
                    duration_minutes: minutes,
                    completed,
                    rating: Some(5),
                    student_name: None,
                },
                activity(EntityType::TEACHER, teacher.id, Action::SESSION_RECORDED),
            )
            .await?;
    }

    let totals = store.session_totals(teacher.id, &september).await?;
    assert_eq!(totals.session_count, 3);
    assert_eq!(totals.regular_minutes, 120);
    assert_eq!(totals.callern_minutes, 45);

    let october = Period::month(2026, 10)?;
    assert_eq!(store.session_totals(teacher.id, &october).await?.session_count, 0);

    let history = store.activity_for(teacher.id).await?;
    assert_eq!(history.len(), 5);
    Ok(())
}

#[sqlx::test]
async fn test_second_payment_for_period_is_a_duplicate(pool: PgPool) -> Result<()> {
    let store = PgStore::new(pool);
    let teacher = teacher(&store, Department::Regular).await?;
    let first = calculated(&teacher, "2026-09");
    store
        .insert_payment(&first, activity(EntityType::PAYMENT, first.id, Action::CALCULATED))
        .await?;

    let second = calculated(&teacher, "2026-09");
    let err = store
        .insert_payment(&second, activity(EntityType::PAYMENT, second.id, Action::CALCULATED))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::Duplicate(_))
    ));

    let stored = store.find_payment_for(teacher.id, "2026-09").await?;
    assert_eq!(stored.map(|p| p.id), Some(first.id));
    // The failed insert left no audit row behind
    assert!(store.activity_for(second.id).await?.is_empty());
    Ok(())
}

#[sqlx::test]
async fn test_stale_version_write_is_refused(pool: PgPool) -> Result<()> {
    let store = PgStore::new(pool);
    let teacher = teacher(&store, Department::Regular).await?;
    let payment = calculated(&teacher, "2026-09");
    let payment = store
        .insert_payment(&payment, activity(EntityType::PAYMENT, payment.id, Action::CALCULATED))
        .await?;

    let edited = TeacherPayment {
        bonuses: 200_000,
        final_amount: 5_600_000,
        ..payment.clone()
    };
    let saved = store
        .save_payment(
            &edited,
            payment.version,
            activity(EntityType::PAYMENT, payment.id, Action::UPDATED),
        )
        .await?
        .expect("version matches");
    assert_eq!(saved.version, payment.version + 1);
    assert_eq!(saved.final_amount, 5_600_000);

    let stale = TeacherPayment {
        deductions: 100_000,
        final_amount: 5_300_000,
        ..payment.clone()
    };
    let refused = store
        .save_payment(
            &stale,
            payment.version,
            activity(EntityType::PAYMENT, payment.id, Action::UPDATED),
        )
        .await?;
    assert!(refused.is_none());

    let current = store.find_payment(payment.id).await?.expect("payment exists");
    assert_eq!(current.final_amount, 5_600_000);
    assert_eq!(current.version, saved.version);
    assert_eq!(store.activity_for(payment.id).await?.len(), 2);
    Ok(())
}

#[sqlx::test]
async fn test_approval_queues_exactly_one_notification(pool: PgPool) -> Result<()> {
    let store = PgStore::new(pool);
    let teacher = teacher(&store, Department::Regular).await?;
    let payment = calculated(&teacher, "2026-09");
    let payment = store
        .insert_payment(&payment, activity(EntityType::PAYMENT, payment.id, Action::CALCULATED))
        .await?;
    let approved = TeacherPayment {
        status: PaymentStatus::Approved,
        approved_at: Some(Utc::now()),
        ..payment.clone()
    };

    let (saved, entry) = store
        .approve_payment(
            &approved,
            payment.version,
            notice(&payment),
            activity(EntityType::PAYMENT, payment.id, Action::APPROVED),
        )
        .await?
        .expect("version matches");
    assert_eq!(saved.status, PaymentStatus::Approved);
    assert_eq!(entry.status, OutboxStatus::Pending);
    assert_eq!(entry.payload.0.amount, 5_400_000);
    assert!(entry.next_attempt_at > Utc::now());

    // A second approval from the same read loses and queues nothing
    let again = store
        .approve_payment(
            &approved,
            payment.version,
            notice(&payment),
            activity(EntityType::PAYMENT, payment.id, Action::APPROVED),
        )
        .await?;
    assert!(again.is_none());

    let entries = store.notifications_for_payment(payment.id).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, entry.id);

    assert!(store.due_notifications(Utc::now(), 10).await?.is_empty());
    let later = Utc::now() + Duration::minutes(5);
    assert_eq!(store.due_notifications(later, 10).await?.len(), 1);
    Ok(())
}

#[sqlx::test]
async fn test_sent_notification_is_not_reopened(pool: PgPool) -> Result<()> {
    let store = PgStore::new(pool);
    let teacher = teacher(&store, Department::Regular).await?;
    let payment = calculated(&teacher, "2026-09");
    let payment = store
        .insert_payment(&payment, activity(EntityType::PAYMENT, payment.id, Action::CALCULATED))
        .await?;
    let approved = TeacherPayment {
        status: PaymentStatus::Approved,
        ..payment.clone()
    };
    let (_, entry) = store
        .approve_payment(
            &approved,
            payment.version,
            notice(&payment),
            activity(EntityType::PAYMENT, payment.id, Action::APPROVED),
        )
        .await?
        .expect("version matches");

    let failed = store
        .mark_notification_failed(entry.id, "carrier unavailable", Some(Utc::now()))
        .await?;
    assert_eq!(failed.status, OutboxStatus::Pending);
    assert_eq!(failed.attempts, 1);

    let sent = store.mark_notification_sent(entry.id, Utc::now()).await?;
    assert_eq!(sent.status, OutboxStatus::Sent);
    assert_eq!(sent.attempts, 2);

    let late = store
        .mark_notification_failed(entry.id, "timeout", Some(Utc::now()))
        .await?;
    assert_eq!(late.status, OutboxStatus::Sent);
    assert_eq!(late.attempts, 2);
    assert_eq!(late.last_error, None);

    let later = Utc::now() + Duration::hours(2);
    assert!(store.due_notifications(later, 10).await?.is_empty());

    let missing = store
        .mark_notification_sent(Uuid::new_v4(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        missing.downcast_ref::<StoreError>(),
        Some(StoreError::NotFound(_))
    ));
    Ok(())
}

#[sqlx::test]
async fn test_submission_tracking_ids_are_unique(pool: PgPool) -> Result<()> {
    let store = PgStore::new(pool);
    let submission = AccountingSubmission {
        tracking_id: "ACC-2026-09-0001".to_string(),
        period: "2026-09".to_string(),
        payment_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
        total_amount: 9_800_000,
        submitted_by: Uuid::new_v4(),
        submitted_at: Utc::now(),
    };
    let recorded = store
        .record_submission(
            &submission,
            activity(EntityType::ACCOUNTING, Uuid::new_v4(), Action::SENT_TO_ACCOUNTING),
        )
        .await?;
    assert_eq!(recorded.payment_ids, submission.payment_ids);

    let err = store
        .record_submission(
            &submission,
            activity(EntityType::ACCOUNTING, Uuid::new_v4(), Action::SENT_TO_ACCOUNTING),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::Duplicate(_))
    ));
    Ok(())
}
