use crate::api::schemas::users::UserResponse;
use crate::domain::auth_session::AuthSession;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
pub struct Login {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Refresh {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserResponse,
    pub token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl From<AuthSession> for SessionResponse {
    fn from(session: AuthSession) -> Self {
        // Session payloads never carry a phone number, whatever the role.
        Self {
            user: UserResponse::new(session.user, None),
            token: session.token.0,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
            refresh_expires_at: session.refresh_expires_at,
        }
    }
}
