use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::ApiResponse;
use crate::api::schemas::users::{
    CreateUserRequest, ListUsersQuery, UpdateUserRequest, UserParams, UserResponse, UsersCollection,
};
use crate::domain::user::{Role, UserFilter};
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
};
use uuid::Uuid;

// Unparseable ids cannot name an existing user.
fn user_id(path: std::result::Result<Path<Uuid>, PathRejection>) -> Result<Uuid> {
    path.map(|Path(id)| id).map_err(|_| AppError::NotFound("User"))
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload.map(|Json(body)| body).map_err(|rejection| AppError::ValidationFailed(vec![rejection.body_text()]))
}

pub async fn index(
    AuthUser(auth): AuthUser,
    State(state): State<AppState>,
    query: std::result::Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<ApiResponse<UsersCollection>> {
    let Query(query) = query.map_err(|rejection| AppError::ValidationFailed(vec![rejection.body_text()]))?;

    let role = match query.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => Some(raw.parse::<Role>().map_err(|e| AppError::ValidationFailed(vec![e]))?),
        None => None,
    };
    let filter = UserFilter::new(query.search, role, query.page, query.per_page);

    let page = state.user_service.list(&auth.user, &filter).await?;
    Ok(ApiResponse::ok("Users retrieved", UsersCollection::new(page, &auth.user)))
}

pub async fn show(
    AuthUser(auth): AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<ApiResponse<UserResponse>> {
    let user = state.user_service.show(&auth.user, user_id(path)?).await?;
    Ok(ApiResponse::ok("User retrieved", UserResponse::new(user, Some(&auth.user))))
}

pub async fn create(
    AuthUser(auth): AuthUser,
    State(state): State<AppState>,
    payload: std::result::Result<Json<UserParams<CreateUserRequest>>, JsonRejection>,
) -> Result<ApiResponse<UserResponse>> {
    let params = body(payload)?;
    let user = state.user_service.create(&auth.user, params.user.into()).await?;
    Ok(ApiResponse::created("User created", UserResponse::new(user, Some(&auth.user))))
}

pub async fn update(
    AuthUser(auth): AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
    payload: std::result::Result<Json<UserParams<UpdateUserRequest>>, JsonRejection>,
) -> Result<ApiResponse<UserResponse>> {
    let id = user_id(path)?;
    let params = body(payload)?;
    let user = state.user_service.update(&auth.user, id, params.user.into()).await?;
    Ok(ApiResponse::ok("User updated", UserResponse::new(user, Some(&auth.user))))
}

pub async fn destroy(
    AuthUser(auth): AuthUser,
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<ApiResponse<()>> {
    state.user_service.destroy(&auth.user, user_id(path)?).await?;
    Ok(ApiResponse::message("User deleted permanently"))
}
