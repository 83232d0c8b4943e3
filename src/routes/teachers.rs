use actix_web::web;

use crate::handlers::teachers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/teachers")
            .route("", web::post().to(teachers::create_teacher))
            .route("/rates", web::get().to(teachers::get_rates))
            .route("/{teacher_id}/rates", web::put().to(teachers::update_rates))
            .route(
                "/{teacher_id}/sessions",
                web::post().to(teachers::record_session),
            ),
    );
}
