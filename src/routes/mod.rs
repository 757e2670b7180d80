pub mod admin;
pub mod application_fee;
pub mod auth;
pub mod subscription;
pub mod webhook;

use rocket::serde::json::Json;
use rocket_okapi::openapi;

use crate::utils::ApiResponse;

#[openapi(tag = "Health")]
#[get("/health")]
pub async fn health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
