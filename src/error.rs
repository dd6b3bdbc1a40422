use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Why a bearer token was rejected. Never shown to clients; all of these map to the same 401.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed token")]
    MalformedToken,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token revoked")]
    Revoked,
    #[error("user not found")]
    UserNotFound,
}

impl AuthFailure {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MalformedToken => "malformed_token",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::UserNotFound => "user_not_found",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthFailure),
    #[error("Not authorized: {0}")]
    NotAuthorized(String),
    #[error("Validation failed: {}", .0.join(", "))]
    ValidationFailed(Vec<String>),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    OperationFailed(&'static str),
    #[error("Too many requests")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("Internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, message, errors) = match self {
            Self::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred".to_string(), None)
            }
            Self::InvalidCredentials => {
                tracing::debug!("Login rejected");
                (StatusCode::UNAUTHORIZED, "Authentication failed".to_string(), None)
            }
            Self::Auth(reason) => {
                tracing::debug!(reason = reason.as_str(), "Authentication failed");
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string(), None)
            }
            Self::NotAuthorized(detail) => {
                tracing::debug!(detail = %detail, "Authorization denied");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "You are not authorized to perform this action".to_string(),
                    Some(vec![detail]),
                )
            }
            Self::ValidationFailed(errors) => {
                tracing::debug!(errors = ?errors, "Validation failed");
                (StatusCode::UNPROCESSABLE_ENTITY, "Validation failed".to_string(), Some(errors))
            }
            Self::NotFound(what) => {
                tracing::debug!(resource = what, "Resource not found");
                (StatusCode::NOT_FOUND, format!("{what} not found"), None)
            }
            Self::OperationFailed(msg) => {
                tracing::warn!(message = msg, "Operation failed");
                (StatusCode::UNPROCESSABLE_ENTITY, msg.to_string(), None)
            }
            Self::RateLimited { retry_after_secs } => {
                retry_after = retry_after_secs;
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests, please try again later".to_string(), None)
            }
            Self::Internal => {
                tracing::error!("Internal server error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred".to_string(), None)
            }
        };

        let body = errors.map_or_else(
            || json!({ "success": false, "message": message }),
            |errors| json!({ "success": false, "message": message, "errors": errors }),
        );

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
