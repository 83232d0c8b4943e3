use actix_web::{
    HttpResponse, Result,
    web::{Data, Json, Path, Query},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    database::models::{ApprovalNotice, CalculatePaymentsInput, PaymentQuery, UpdatePaymentInput},
    handlers::shared::ApiResponse,
    middleware::RequestInfo,
    services::{AuditContext, Claims, PaymentService},
};

pub async fn get_payments(
    claims: Claims,
    service: Data<PaymentService>,
    query: Query<PaymentQuery>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let payments = service.list(query.period.as_deref()).await?;
    Ok(ApiResponse::success(payments))
}

pub async fn get_summary(
    claims: Claims,
    service: Data<PaymentService>,
    query: Query<PaymentQuery>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let summary = service.summary(query.period.as_deref()).await?;
    Ok(ApiResponse::success(summary))
}

pub async fn calculate_payments(
    claims: Claims,
    req_info: RequestInfo,
    service: Data<PaymentService>,
    input: Json<CalculatePaymentsInput>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let audit = AuditContext::from_request(&claims, &req_info);
    let summary = service.calculate(input.into_inner(), &audit).await?;

    let message = format!(
        "{} payments created, {} recalculated",
        summary.created, summary.recalculated
    );
    Ok(ApiResponse::success_with_message(summary, &message))
}

pub async fn update_payment(
    claims: Claims,
    req_info: RequestInfo,
    service: Data<PaymentService>,
    path: Path<Uuid>,
    input: Json<UpdatePaymentInput>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let audit = AuditContext::from_request(&claims, &req_info);
    let result = service
        .update(path.into_inner(), input.into_inner(), &audit)
        .await?;
    Ok(ApiResponse::success(result))
}

pub async fn approve_payment(
    claims: Claims,
    req_info: RequestInfo,
    service: Data<PaymentService>,
    path: Path<Uuid>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let audit = AuditContext::from_request(&claims, &req_info);
    let result = service.approve(path.into_inner(), &audit).await?;

    let message = match &result.notification {
        _ if result.already_approved => "Payment was already approved".to_string(),
        Some(report) if report.error.is_some() => format!(
            "Payment approved, but the SMS notification failed: {}",
            report.error.as_deref().unwrap_or_default()
        ),
        _ => "Payment approved and teacher notified".to_string(),
    };
    Ok(ApiResponse::success_with_message(result, &message))
}

pub async fn mark_paid(
    claims: Claims,
    req_info: RequestInfo,
    service: Data<PaymentService>,
    path: Path<Uuid>,
) -> Result<HttpResponse> {
    claims.requires_admin()?;
    let audit = AuditContext::from_request(&claims, &req_info);
    let result = service.mark_paid(path.into_inner(), &audit).await?;
    Ok(ApiResponse::success(result))
}

pub async fn send_approval_sms(
    claims: Claims,
    req_info: RequestInfo,
    service: Data<PaymentService>,
    input: Json<ApprovalNotice>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let audit = AuditContext::from_request(&claims, &req_info);
    let notice = input.into_inner();
    let teacher_id = notice.teacher_id;
    service.send_approval_sms(notice, &audit).await?;
    Ok(ApiResponse::success_with_message(
        json!({ "teacherId": teacher_id, "sent": true }),
        "SMS sent",
    ))
}

pub async fn get_history(
    claims: Claims,
    service: Data<PaymentService>,
    path: Path<Uuid>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let payments = service.history(path.into_inner()).await?;
    Ok(ApiResponse::success(json!({ "payments": payments })))
}

pub async fn get_sessions(
    claims: Claims,
    service: Data<PaymentService>,
    path: Path<(Uuid, String)>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let (teacher_id, period) = path.into_inner();
    let sessions = service.sessions(teacher_id, &period).await?;
    Ok(ApiResponse::success(sessions))
}

pub async fn get_notifications(
    claims: Claims,
    service: Data<PaymentService>,
    path: Path<Uuid>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let entries = service.notifications(path.into_inner()).await?;
    Ok(ApiResponse::success(entries))
}

pub async fn get_activity(
    claims: Claims,
    service: Data<PaymentService>,
    path: Path<Uuid>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let activity = service.activity(path.into_inner()).await?;
    Ok(ApiResponse::success(activity))
}
