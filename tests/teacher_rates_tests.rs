use actix_web::{App, http::StatusCode, test};
use bigdecimal::BigDecimal;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use teacher_payments::database::models::{
    CalculatePaymentsInput, Department, SessionKind, Teacher, TeacherRates,
};
use teacher_payments::routes;
use teacher_payments::services::AuditContext;

mod common;

use common::{SEPTEMBER, TestContext, assert_success_response, september};

#[actix_web::test]
async fn test_rates_listing_rolls_up_completed_sessions() {
    let ctx = TestContext::new().await;
    let app = test::init_service(App::new().configure(|cfg| routes::configure(cfg, &ctx.state))).await;

    let teacher = ctx.create_teacher(Department::Regular, 450_000, None).await;
    ctx.record_session(&teacher, SessionKind::Regular, september(1, 9), 90, Some(5))
        .await;
    ctx.record_session(&teacher, SessionKind::Regular, september(2, 9), 60, Some(4))
        .await;
    ctx.record_session(&teacher, SessionKind::Regular, september(3, 9), 30, None)
        .await;
    let newcomer = ctx.create_teacher(Department::Regular, 300_000, None).await;

    let req = test::TestRequest::get()
        .uri("/api/teachers/rates")
        .insert_header(ctx.manager_header())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let rates: Vec<TeacherRates> = assert_success_response(&test::read_body(resp).await);
    assert_eq!(rates.len(), 2);

    let busy = rates.iter().find(|r| r.id == teacher.id).unwrap();
    assert_eq!(busy.total_sessions, 3);
    assert_eq!(busy.total_hours, BigDecimal::from(3));
    assert_eq!(busy.performance, Some(4.5));

    let idle = rates.iter().find(|r| r.id == newcomer.id).unwrap();
    assert_eq!(idle.total_sessions, 0);
    assert_eq!(idle.performance, None);
}

#[actix_web::test]
async fn test_rate_change_does_not_touch_existing_payments() {
    let ctx = TestContext::new().await;
    let app = test::init_service(App::new().configure(|cfg| routes::configure(cfg, &ctx.state))).await;

    let teacher = ctx.create_teacher(Department::Regular, 450_000, None).await;
    ctx.record_session(&teacher, SessionKind::Regular, september(4, 9), 120, None)
        .await;
    ctx.state
        .payments
        .calculate(
            CalculatePaymentsInput {
                period: SEPTEMBER.to_string(),
                use_individual_rates: true,
                start_date: None,
                end_date: None,
                override_approved: false,
            },
            &AuditContext::system(),
        )
        .await
        .unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/teachers/{}/rates", teacher.id))
        .insert_header(ctx.manager_header())
        .set_json(json!({ "regularRate": 600000 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let updated: Teacher = assert_success_response(&test::read_body(resp).await);
    assert_eq!(updated.hourly_rate, 600_000);

    let payments = ctx.state.payments.list(Some(SEPTEMBER)).await.unwrap();
    assert_eq!(payments[0].hourly_rate, 450_000);
    assert_eq!(payments[0].base_pay, 900_000);

    let activity = ctx.state.payments.activity(payments[0].id).await.unwrap();
    assert!(activity.iter().all(|a| a.action != "rates_updated"));
}

#[actix_web::test]
async fn test_rate_validation() {
    let ctx = TestContext::new().await;
    let app = test::init_service(App::new().configure(|cfg| routes::configure(cfg, &ctx.state))).await;
    let teacher = ctx
        .create_teacher(Department::Callern, 400_000, Some(350_000))
        .await;

    for body in [
        json!({ "regularRate": -5 }),
        json!({ "regularRate": 400000 }),
        json!({ "regularRate": 400000, "callernRate": -1 }),
    ] {
        let req = test::TestRequest::put()
            .uri(&format!("/api/teachers/{}/rates", teacher.id))
            .insert_header(ctx.manager_header())
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    let req = test::TestRequest::put()
        .uri(&format!("/api/teachers/{}/rates", uuid::Uuid::new_v4()))
        .insert_header(ctx.manager_header())
        .set_json(json!({ "regularRate": 400000 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Not JSON at all
    let req = test::TestRequest::put()
        .uri(&format!("/api/teachers/{}/rates", teacher.id))
        .insert_header(ctx.manager_header())
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{ regularRate")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn test_register_teacher_and_record_sessions() {
    let ctx = TestContext::new().await;
    let app = test::init_service(App::new().configure(|cfg| routes::configure(cfg, &ctx.state))).await;

    let req = test::TestRequest::post()
        .uri("/api/teachers")
        .insert_header(ctx.manager_header())
        .set_json(json!({
            "name": "  Reza Karimi ",
            "phone": "+989121234567",
            "hourlyRate": 500000,
            "callernRate": 350000,
            "department": "both"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let teacher: Teacher = assert_success_response(&test::read_body(resp).await);
    assert_eq!(teacher.name, "Reza Karimi");
    assert_eq!(teacher.department, Department::Both);
    assert!(teacher.active);

    let sessions_uri = format!("/api/teachers/{}/sessions", teacher.id);
    let req = test::TestRequest::post()
        .uri(&sessions_uri)
        .insert_header(ctx.manager_header())
        .set_json(json!({
            "kind": "callern",
            "startedAt": "2026-09-10T08:30:00Z",
            "durationMinutes": 45,
            "rating": 5
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    for body in [
        json!({ "kind": "regular", "startedAt": "2026-09-10T08:30:00Z", "durationMinutes": 0 }),
        json!({ "kind": "regular", "startedAt": "2026-09-10T08:30:00Z", "durationMinutes": 1441 }),
        json!({ "kind": "regular", "startedAt": "2026-09-10T08:30:00Z", "durationMinutes": 30, "rating": 6 }),
    ] {
        let req = test::TestRequest::post()
            .uri(&sessions_uri)
            .insert_header(ctx.manager_header())
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/admin/teacher-payments/{}/sessions/2026-09",
            teacher.id
        ))
        .insert_header(ctx.manager_header())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let sessions: Vec<Value> = assert_success_response(&test::read_body(resp).await);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["kind"], "callern");

    // Callern teachers need a callern rate
    let req = test::TestRequest::post()
        .uri("/api/teachers")
        .insert_header(ctx.manager_header())
        .set_json(json!({ "name": "No Rate", "hourlyRate": 500000, "department": "callern" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_history_lists_newest_period_first() {
    let ctx = TestContext::new().await;
    let app = test::init_service(App::new().configure(|cfg| routes::configure(cfg, &ctx.state))).await;

    let teacher = ctx.create_teacher(Department::Regular, 450_000, None).await;
    let august_31 = september(1, 9) - chrono::Duration::days(1);
    for (period, started) in [("2026-08", august_31), (SEPTEMBER, september(1, 9))] {
        ctx.record_session(&teacher, SessionKind::Regular, started, 60, None)
            .await;
        ctx.state
            .payments
            .calculate(
                CalculatePaymentsInput {
                    period: period.to_string(),
                    use_individual_rates: true,
                    start_date: None,
                    end_date: None,
                    override_approved: false,
                },
                &AuditContext::system(),
            )
            .await
            .unwrap();
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/admin/teacher-payments/history/{}", teacher.id))
        .insert_header(ctx.manager_header())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let history: Value = assert_success_response(&test::read_body(resp).await);
    let periods: Vec<&str> = history["payments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["period"].as_str().unwrap())
        .collect();
    assert_eq!(periods, vec!["2026-09", "2026-08"]);
}
