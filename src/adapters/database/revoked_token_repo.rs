use crate::adapters::database::DbPool;
use crate::domain::revocation::RevocationEntry;
use crate::error::Result;
use crate::services::revocation_service::RevocationStore;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Revoked access tokens. Rows cascade away with their user.
#[derive(Clone, Debug)]
pub struct PgRevocationStore {
    pool: DbPool,
}

impl PgRevocationStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    #[tracing::instrument(level = "debug", skip(self, entry), fields(user_id = %entry.user_id), err)]
    async fn insert(&self, entry: &RevocationEntry) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO revoked_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3) ON CONFLICT (jti) DO NOTHING",
        )
        .bind(&entry.jti)
        .bind(entry.user_id)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn contains(&self, jti: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1)")
            .bind(jti)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1").bind(now).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
