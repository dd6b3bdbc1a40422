use crate::domain::user::{ProfileChanges, User, UserPage};
use crate::services::user_service::CreateUser;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Public view of an account. `phone` is withheld unless the viewer is an admin.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: &'static str,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl UserResponse {
    #[must_use]
    pub fn new(user: User, viewer: Option<&User>) -> Self {
        let show_phone = viewer.is_some_and(User::is_admin);
        Self {
            full_name: user.full_name(),
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: if show_phone { user.phone } else { None },
            role: user.role.as_str(),
            active: user.active,
            created_at: user.created_at,
        }
    }
}

/// Request bodies nest the fields under `user`.
#[derive(Debug, Deserialize)]
pub struct UserParams<T> {
    #[serde(default)]
    pub user: T,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
}

impl From<CreateUserRequest> for CreateUser {
    fn from(req: CreateUserRequest) -> Self {
        Self {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            role: req.role,
        }
    }
}

/// Only profile fields are accepted; anything else in the body is ignored. A blank
/// `last_name` or `phone` clears the field.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl From<UpdateUserRequest> for ProfileChanges {
    fn from(req: UpdateUserRequest) -> Self {
        Self { first_name: req.first_name, last_name: req.last_name.map(Some), phone: req.phone.map(Some) }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: i64,
    pub total_count: i64,
}

#[derive(Debug, Serialize)]
pub struct UsersCollection {
    pub users: Vec<UserResponse>,
    pub pagination: Pagination,
}

impl UsersCollection {
    #[must_use]
    pub fn new(page: UserPage, viewer: &User) -> Self {
        let pagination =
            Pagination { current_page: page.page, total_pages: page.total_pages(), total_count: page.total_count };
        Self { users: page.users.into_iter().map(|u| UserResponse::new(u, Some(viewer))).collect(), pagination }
    }
}
