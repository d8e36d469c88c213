use actix_web::{get, HttpResponse};
use serde_json::json;

use crate::response::ApiResponse;

#[get("/healthcheck")]
pub async fn healthcheck() -> HttpResponse {
    ApiResponse::ok(json!({ "status": "OK" }), "Health check passed")
}
