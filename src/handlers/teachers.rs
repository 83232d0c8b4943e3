use actix_web::{
    HttpResponse, Result,
    web::{Data, Json, Path},
};
use uuid::Uuid;

use crate::{
    database::models::{CreateTeacherInput, RecordSessionInput, UpdateRatesInput},
    handlers::shared::ApiResponse,
    middleware::RequestInfo,
    services::{AuditContext, Claims, TeacherService},
};

pub async fn get_rates(claims: Claims, service: Data<TeacherService>) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let rates = service.rates().await?;
    Ok(ApiResponse::success(rates))
}

pub async fn update_rates(
    claims: Claims,
    req_info: RequestInfo,
    service: Data<TeacherService>,
    path: Path<Uuid>,
    input: Json<UpdateRatesInput>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let audit = AuditContext::from_request(&claims, &req_info);
    let teacher = service
        .update_rates(path.into_inner(), input.into_inner(), &audit)
        .await?;
    Ok(ApiResponse::success_with_message(teacher, "Rates updated"))
}

pub async fn create_teacher(
    claims: Claims,
    req_info: RequestInfo,
    service: Data<TeacherService>,
    input: Json<CreateTeacherInput>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let audit = AuditContext::from_request(&claims, &req_info);
    let teacher = service.create_teacher(input.into_inner(), &audit).await?;
    Ok(ApiResponse::created(teacher))
}

pub async fn record_session(
    claims: Claims,
    req_info: RequestInfo,
    service: Data<TeacherService>,
    path: Path<Uuid>,
    input: Json<RecordSessionInput>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let audit = AuditContext::from_request(&claims, &req_info);
    let session = service
        .record_session(path.into_inner(), input.into_inner(), &audit)
        .await?;
    Ok(ApiResponse::created(session))
}
