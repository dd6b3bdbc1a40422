use crate::domain::auth::{AccessClaims, Jwt};
use crate::domain::user::User;
use time::OffsetDateTime;

/// A freshly issued access + refresh token pair.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub token: Jwt,
    pub refresh_token: String,
    pub expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

/// The caller of a protected request: the resolved user and the claims of the token they presented.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub claims: AccessClaims,
}
