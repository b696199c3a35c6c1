use actix_web::{HttpResponse, web};
use mongodb::bson::doc;

use crate::state::app_state::AppState;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    // A ping is enough to tell whether the event store is reachable
    match state.db.run_command(doc! { "ping": 1 }).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })),
        Err(_) => HttpResponse::InternalServerError()
            .json(serde_json::json!({ "status": "degraded", "error": "Event store unreachable" })),
    }
}
