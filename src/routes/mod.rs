use actix_web::{HttpResponse, error::InternalError, web};

use crate::AppState;
use crate::handlers::{self, shared::ApiResponse};

pub mod payments;
pub mod teachers;

/// Malformed JSON bodies answer with the standard envelope.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid request body: {}", err);
        log::warn!("{}", message);
        InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(ApiResponse::<()>::error(&message)),
        )
        .into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid query string: {}", err);
        InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(ApiResponse::<()>::error(&message)),
        )
        .into()
    })
}

pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(state.config.clone())
        .app_data(state.payments.clone())
        .app_data(state.teachers.clone())
        .app_data(json_config())
        .app_data(query_config())
        .route("/health", web::get().to(handlers::health))
        .service(
            web::scope("/api")
                .configure(payments::configure)
                .configure(teachers::configure),
        );
}
