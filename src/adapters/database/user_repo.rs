use crate::adapters::database::DbPool;
use crate::adapters::database::records::UserRecord;
use crate::domain::user::{NewUser, ProfileChanges, User, UserFilter, UserPage};
use crate::error::{AppError, Result};
use crate::services::credential_service::{UserStore, email_taken};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone, role, active, \
                            refresh_token_hash, refresh_token_expires_at, created_at, updated_at";

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn into_user(record: UserRecord) -> Result<User> {
    User::try_from(record).map_err(|e| {
        tracing::error!(error = %e, "Corrupt user row");
        AppError::Internal
    })
}

fn into_user_opt(record: Option<UserRecord>) -> Result<Option<User>> {
    record.map(into_user).transpose()
}

/// Escapes `%`, `_` and `\` so a search term matches literally inside ILIKE.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl UserStore for PgUserStore {
    #[tracing::instrument(level = "debug", skip(self, email), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        into_user_opt(record)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        into_user_opt(record)
    }

    #[tracing::instrument(level = "debug", skip(self, user), err)]
    async fn create(&self, user: NewUser) -> Result<User> {
        let result = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, phone, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => into_user(record),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => Err(email_taken()),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, changes), err)]
    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = CASE WHEN $3 THEN $4 ELSE last_name END,
                phone = CASE WHEN $5 THEN $6 ELSE phone END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.first_name)
        .bind(changes.last_name.is_some())
        .bind(changes.last_name.clone().flatten())
        .bind(changes.phone.is_some())
        .bind(changes.phone.clone().flatten())
        .fetch_optional(&self.pool)
        .await?;

        into_user_opt(record)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(level = "debug", skip(self, filter), err)]
    async fn list(&self, filter: &UserFilter) -> Result<UserPage> {
        let pattern = filter.search.as_deref().map(like_pattern);
        let role = filter.role.map(|r| r.as_str());

        let total_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM users
            WHERE ($1::text IS NULL
                   OR first_name ILIKE $1 OR last_name ILIKE $1 OR email ILIKE $1)
              AND ($2::text IS NULL OR role = $2)
            "#,
        )
        .bind(&pattern)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        let records = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::text IS NULL
                   OR first_name ILIKE $1 OR last_name ILIKE $1 OR email ILIKE $1)
              AND ($2::text IS NULL OR role = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(&pattern)
        .bind(role)
        .bind(i64::from(filter.per_page))
        .bind(filter.offset())
        .fetch_all(&self.pool)
        .await?;

        let users = records.into_iter().map(into_user).collect::<Result<Vec<_>>>()?;
        Ok(UserPage { users, total_count, page: filter.page, per_page: filter.per_page })
    }

    #[tracing::instrument(level = "debug", skip(self, token_hash), err)]
    async fn replace_refresh_token(&self, id: Uuid, token_hash: &str, expires_at: OffsetDateTime) -> Result<()> {
        sqlx::query("UPDATE users SET refresh_token_hash = $2, refresh_token_expires_at = $3 WHERE id = $1")
            .bind(id)
            .bind(token_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, old_hash, new_hash), err)]
    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        new_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            UPDATE users
            SET refresh_token_hash = $2, refresh_token_expires_at = $3
            WHERE refresh_token_hash = $1 AND refresh_token_expires_at > NOW()
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(old_hash)
        .bind(new_hash)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await?;

        into_user_opt(record)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn clear_refresh_token(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET refresh_token_hash = NULL, refresh_token_expires_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
