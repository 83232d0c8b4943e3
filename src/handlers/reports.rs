use actix_web::{
    HttpResponse, Result,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web::{Data, Json, Query},
};

use crate::{
    database::models::{PaymentQuery, SendToAccountingInput},
    handlers::shared::ApiResponse,
    middleware::RequestInfo,
    services::{AuditContext, Claims, PaymentService},
};

/// The report as a JSON file download.
pub async fn download_report(
    claims: Claims,
    service: Data<PaymentService>,
    query: Query<PaymentQuery>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let report = service.report(query.period.as_deref()).await?;

    let disposition = ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(format!(
            "teacher-payments-{}.json",
            report.period
        ))],
    };
    Ok(HttpResponse::Ok()
        .insert_header(disposition)
        .json(report))
}

pub async fn send_to_accounting(
    claims: Claims,
    req_info: RequestInfo,
    service: Data<PaymentService>,
    input: Json<SendToAccountingInput>,
) -> Result<HttpResponse> {
    claims.requires_manager()?;
    let audit = AuditContext::from_request(&claims, &req_info);
    let receipt = service
        .send_to_accounting(input.into_inner(), &audit)
        .await?;
    Ok(ApiResponse::success_with_message(
        receipt,
        "Payments sent to accounting",
    ))
}
