use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct StopResponse {
    success: bool,
    message: String,
}

pub async fn handler(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let request_id = path.into_inner();
    log::info!("[{}] Stop request received", request_id);

    if state.cancel_stream(&request_id) {
        HttpResponse::Ok().json(StopResponse {
            success: true,
            message: "Completion stopped".to_string(),
        })
    } else {
        log::warn!("[{}] No active completion found", request_id);
        HttpResponse::NotFound().json(StopResponse {
            success: false,
            message: "No active completion found".to_string(),
        })
    }
}
