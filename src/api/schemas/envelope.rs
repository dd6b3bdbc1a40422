use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Success envelope. Failures use the same shape via `AppError`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T> ApiResponse<T> {
    pub const fn ok(message: &'static str, data: T) -> Self {
        Self { success: true, message, data: Some(data), status: StatusCode::OK }
    }

    pub const fn created(message: &'static str, data: T) -> Self {
        Self { success: true, message, data: Some(data), status: StatusCode::CREATED }
    }
}

impl ApiResponse<()> {
    pub const fn message(message: &'static str) -> Self {
        Self { success: true, message, data: None, status: StatusCode::OK }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
