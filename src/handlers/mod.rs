use actix_web::HttpResponse;
use serde_json::json;

pub mod payments;
pub mod reports;
pub mod shared;
pub mod teachers;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now()
    }))
}
