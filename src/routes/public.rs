use crate::AppState;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(api_root))
        .route("/public-key", web::get().to(get_public_key));
}

async fn api_root() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "API Root" }))
}

/// Clients can verify tokens themselves with this key.
async fn get_public_key(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "message": "Public key retrieved",
        "publicKey": state.keys.public_pem(),
    }))
}
