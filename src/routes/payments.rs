use actix_web::web;

use crate::handlers::{payments, reports};

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Literal segments are registered before `{id}` so they win the match.
    cfg.service(
        web::scope("/admin/teacher-payments")
            .route("", web::get().to(payments::get_payments))
            .route("/summary", web::get().to(payments::get_summary))
            .route("/calculate", web::post().to(payments::calculate_payments))
            .route(
                "/send-approval-sms",
                web::post().to(payments::send_approval_sms),
            )
            .route("/download-report", web::get().to(reports::download_report))
            .route(
                "/send-to-accounting",
                web::post().to(reports::send_to_accounting),
            )
            .route("/history/{teacher_id}", web::get().to(payments::get_history))
            .route("/{id}/approve", web::post().to(payments::approve_payment))
            .route("/{id}/update", web::put().to(payments::update_payment))
            .route("/{id}/mark-paid", web::post().to(payments::mark_paid))
            .route(
                "/{id}/notifications",
                web::get().to(payments::get_notifications),
            )
            .route("/{id}/activity", web::get().to(payments::get_activity))
            .route(
                "/{teacher_id}/sessions/{period}",
                web::get().to(payments::get_sessions),
            ),
    );
}
