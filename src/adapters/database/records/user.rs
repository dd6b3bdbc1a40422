use crate::domain::user::{Role, User};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) email: String,
    pub(crate) password_hash: String,
    pub(crate) first_name: String,
    pub(crate) last_name: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) role: String,
    pub(crate) active: bool,
    pub(crate) refresh_token_hash: Option<String>,
    pub(crate) refresh_token_expires_at: Option<OffsetDateTime>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl TryFrom<UserRecord> for User {
    type Error = String;
    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let role: Role = record.role.parse()?;
        Ok(Self {
            id: record.id,
            email: record.email,
            password_hash: record.password_hash,
            first_name: record.first_name,
            last_name: record.last_name,
            phone: record.phone,
            role,
            active: record.active,
            refresh_token_hash: record.refresh_token_hash,
            refresh_token_expires_at: record.refresh_token_expires_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}
