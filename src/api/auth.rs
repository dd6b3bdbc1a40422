use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::ApiResponse;
use crate::api::schemas::auth::{Login, Refresh, SessionResponse};
use crate::api::schemas::users::UserResponse;
use crate::error::{AppError, Result};
use axum::{Json, extract::State, extract::rejection::JsonRejection};

/// Any malformed body is reported as a plain credential failure.
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Login>, JsonRejection>,
) -> Result<ApiResponse<SessionResponse>> {
    let Ok(Json(Login { email: Some(email), password: Some(password) })) = payload else {
        return Err(AppError::InvalidCredentials);
    };
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::InvalidCredentials);
    }

    let session = state.auth_service.login(&email, &password).await?;
    Ok(ApiResponse::ok("Login successful", session.into()))
}

pub async fn refresh(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Refresh>, JsonRejection>,
) -> Result<ApiResponse<SessionResponse>> {
    let Ok(Json(Refresh { refresh_token: Some(refresh_token) })) = payload else {
        return Err(AppError::InvalidCredentials);
    };

    let session = state.auth_service.refresh(&refresh_token).await?;
    Ok(ApiResponse::ok("Token refreshed", session.into()))
}

pub async fn me(AuthUser(auth): AuthUser) -> ApiResponse<UserResponse> {
    let viewer = auth.user.clone();
    ApiResponse::ok("Profile retrieved", UserResponse::new(auth.user, Some(&viewer)))
}

pub async fn logout(AuthUser(auth): AuthUser, State(state): State<AppState>) -> Result<ApiResponse<()>> {
    state.auth_service.logout(&auth).await?;
    Ok(ApiResponse::message("Logout successful"))
}
