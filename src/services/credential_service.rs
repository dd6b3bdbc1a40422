use crate::domain::auth::Password;
use crate::domain::user::{NewUser, ProfileChanges, User, UserFilter, UserPage, normalize_email};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Persistence for user records, including the embedded refresh-token columns.
#[async_trait]
pub trait UserStore: Send + Sync + std::fmt::Debug {
    /// `email` is already normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// # Errors
    /// Returns `AppError::ValidationFailed` if the email is already registered.
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> Result<Option<User>>;

    /// Returns `false` if no such user existed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    async fn list(&self, filter: &UserFilter) -> Result<UserPage>;

    /// Overwrites the refresh token columns, and only those.
    async fn replace_refresh_token(&self, id: Uuid, token_hash: &str, expires_at: OffsetDateTime) -> Result<()>;

    /// Atomically swaps an unexpired refresh token for a new one.
    /// Returns the owner, or `None` if `old_hash` is unknown, replaced or expired.
    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        new_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<Option<User>>;

    async fn clear_refresh_token(&self, id: Uuid) -> Result<()>;
}

pub(crate) fn email_taken() -> AppError {
    AppError::ValidationFailed(vec!["Email has already been taken".to_string()])
}

/// Credential lookups and password checks over a [`UserStore`].
#[derive(Clone, Debug)]
pub struct CredentialService {
    store: Arc<dyn UserStore>,
    password: Password,
}

impl CredentialService {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>, password: Password) -> Self {
        Self { store, password }
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn UserStore> {
        Arc::clone(&self.store)
    }

    /// # Errors
    /// Returns an error if the store is unavailable.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.store.find_by_email(&normalize_email(email)).await
    }

    /// # Errors
    /// Returns an error if the store is unavailable.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.store.find_by_id(id).await
    }

    /// Resolves an email/password pair to an active user.
    ///
    /// Unknown email, wrong password and disabled account are indistinguishable to the caller.
    ///
    /// # Errors
    /// Returns `AppError::InvalidCredentials` on any mismatch.
    #[tracing::instrument(skip(self, email, password), fields(user_id = tracing::field::Empty), err(level = "warn"))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let Some(user) = self.find_by_email(email).await? else {
            tracing::warn!("Login failed: user not found");
            return Err(AppError::InvalidCredentials);
        };

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        if !self.verify_password(&user, password).await? {
            tracing::warn!("Login failed: invalid password");
            return Err(AppError::InvalidCredentials);
        }

        if !user.active {
            tracing::warn!("Login failed: account disabled");
            return Err(AppError::InvalidCredentials);
        }

        Ok(user)
    }

    /// # Errors
    /// Returns `AppError::Internal` if the stored hash is unreadable or the blocking task fails.
    #[tracing::instrument(err, skip(self, user, password), fields(user_id = %user.id))]
    pub async fn verify_password(&self, user: &User, password: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        tokio::task::spawn_blocking(move || Password::verify(&password, &password_hash))
            .await
            .map_err(|_| AppError::Internal)?
    }

    /// # Errors
    /// Returns `AppError::Internal` if hashing fails.
    #[tracing::instrument(err, skip(self, password))]
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let hasher = self.password.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password)).await.map_err(|_| AppError::Internal)?
    }
}
