//! Success half of the response envelope.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            data,
            message: message.into(),
            success: true,
        }
    }

    /// `200 OK` with `data` wrapped in the envelope.
    pub fn ok(data: T, message: impl Into<String>) -> HttpResponse {
        Self::new(StatusCode::OK, data, message).respond()
    }

    /// `201 Created` with `data` wrapped in the envelope.
    pub fn created(data: T, message: impl Into<String>) -> HttpResponse {
        Self::new(StatusCode::CREATED, data, message).respond()
    }

    pub fn respond(self) -> HttpResponse {
        self.respond_with(|builder| builder)
    }

    /// Lets callers attach cookies or headers before the body is written.
    pub fn respond_with(
        self,
        decorate: impl FnOnce(&mut HttpResponseBuilder) -> &mut HttpResponseBuilder,
    ) -> HttpResponse {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let mut builder = HttpResponse::build(status);
        decorate(&mut builder).json(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use serde_json::json;

    #[actix_web::test]
    async fn success_envelope_has_fixed_shape() {
        let response = ApiResponse::created(json!({"id": 1}), "Tweet created successfully");
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = to_bytes(response.into_body()).await.expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(
            body,
            json!({
                "status": 201,
                "data": {"id": 1},
                "message": "Tweet created successfully",
                "success": true
            })
        );
    }
}
