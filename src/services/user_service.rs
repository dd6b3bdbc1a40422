use crate::domain::policy::{Action, Users, authorize};
use crate::domain::user::{NewUser, ProfileChanges, Role, User, UserFilter, UserPage, is_valid_email, normalize_email};
use crate::error::{AppError, Result};
use crate::services::credential_service::CredentialService;
use opentelemetry::{global, metrics::Counter};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Raw account fields as submitted by an admin.
#[derive(Debug, Clone, Default)]
pub struct CreateUser {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
}

#[derive(Clone, Debug)]
struct Metrics {
    created_total: Counter<u64>,
    deleted_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("rental-auth-server");
        Self {
            created_total: meter
                .u64_counter("users_created_total")
                .with_description("Total number of accounts created")
                .build(),
            deleted_total: meter
                .u64_counter("users_deleted_total")
                .with_description("Total number of accounts deleted")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UserService {
    credentials: CredentialService,
    metrics: Metrics,
}

impl UserService {
    #[must_use]
    pub fn new(credentials: CredentialService) -> Self {
        Self { credentials, metrics: Metrics::new() }
    }

    /// # Errors
    /// `NotAuthorized` for non-admins, `ValidationFailed` listing every invalid field.
    #[tracing::instrument(skip(self, actor, input), fields(actor_id = %actor.id), err(level = "warn"))]
    pub async fn create(&self, actor: &User, input: CreateUser) -> Result<User> {
        authorize(actor, Action::Create, &Users)?;

        let (draft, password) = validate_new_user(input)?;
        let password_hash = self.credentials.hash_password(&password).await?;
        let user = self.credentials.store().create(NewUser { password_hash, ..draft }).await?;

        self.metrics.created_total.add(1, &[]);
        tracing::info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// # Errors
    /// `NotAuthorized` for non-admins.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id), err(level = "warn"))]
    pub async fn list(&self, actor: &User, filter: &UserFilter) -> Result<UserPage> {
        authorize(actor, Action::Index, &Users)?;
        self.credentials.store().list(filter).await
    }

    /// # Errors
    /// `NotFound` if absent, then `NotAuthorized` unless the actor is the user or an admin.
    pub async fn show(&self, actor: &User, id: Uuid) -> Result<User> {
        let user = self.find(id).await?;
        authorize(actor, Action::Show, &user)?;
        Ok(user)
    }

    /// Applies profile edits. Email, password, role and active flag are not editable here.
    ///
    /// # Errors
    /// `NotFound`, `NotAuthorized`, or `ValidationFailed` for a blank first name.
    #[tracing::instrument(skip(self, actor, changes), fields(actor_id = %actor.id), err(level = "warn"))]
    pub async fn update(&self, actor: &User, id: Uuid, changes: ProfileChanges) -> Result<User> {
        let user = self.find(id).await?;
        authorize(actor, Action::Update, &user)?;

        let changes = validate_profile(changes)?;
        if changes.is_empty() {
            return Ok(user);
        }

        self.credentials.store().update_profile(id, &changes).await?.ok_or(AppError::NotFound("User"))
    }

    /// Hard delete. Outstanding access tokens of the user stop verifying immediately.
    ///
    /// # Errors
    /// `NotFound` or `NotAuthorized`.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.id), err(level = "warn"))]
    pub async fn destroy(&self, actor: &User, id: Uuid) -> Result<()> {
        let user = self.find(id).await?;
        authorize(actor, Action::Destroy, &user)?;

        if !self.credentials.store().delete(id).await? {
            return Err(AppError::NotFound("User"));
        }

        self.metrics.deleted_total.add(1, &[]);
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Creates the admin account if no user holds `email` yet. Existing accounts are left alone.
    ///
    /// # Errors
    /// `ValidationFailed` if the credentials are unusable, or a store error.
    #[tracing::instrument(skip(self, email, password), err)]
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<User> {
        if let Some(existing) = self.credentials.find_by_email(email).await? {
            if !existing.is_admin() {
                tracing::warn!(user_id = %existing.id, "Bootstrap admin email belongs to a non-admin account");
            }
            return Ok(existing);
        }

        let input = CreateUser {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            first_name: Some("Admin".to_string()),
            last_name: Some("User".to_string()),
            phone: None,
            role: Some(Role::Admin.as_str().to_string()),
        };
        let (draft, password) = validate_new_user(input)?;
        let password_hash = self.credentials.hash_password(&password).await?;
        let user = self.credentials.store().create(NewUser { password_hash, ..draft }).await?;

        tracing::info!(user_id = %user.id, "Bootstrap admin created");
        Ok(user)
    }

    async fn find(&self, id: Uuid) -> Result<User> {
        self.credentials.find_by_id(id).await?.ok_or(AppError::NotFound("User"))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Returns the user to insert (with an empty hash) and the plaintext password to hash.
fn validate_new_user(input: CreateUser) -> Result<(NewUser, String)> {
    let mut errors = Vec::new();

    let email = non_blank(input.email).map(|e| normalize_email(&e));
    match &email {
        None => errors.push("Email can't be blank".to_string()),
        Some(e) if !is_valid_email(e) => errors.push("Email is invalid".to_string()),
        Some(_) => {}
    }

    let password = input.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!("Password is too short (minimum is {MIN_PASSWORD_LEN} characters)"));
    }

    let first_name = non_blank(input.first_name);
    if first_name.is_none() {
        errors.push("First name can't be blank".to_string());
    }

    let role = match non_blank(input.role) {
        None => Role::default(),
        Some(raw) => raw.parse::<Role>().unwrap_or_else(|e| {
            errors.push(e);
            Role::default()
        }),
    };

    if !errors.is_empty() {
        return Err(AppError::ValidationFailed(errors));
    }

    let draft = NewUser {
        email: email.unwrap_or_default(),
        password_hash: String::new(),
        first_name: first_name.unwrap_or_default(),
        last_name: non_blank(input.last_name),
        phone: non_blank(input.phone),
        role,
    };
    Ok((draft, password))
}

fn validate_profile(changes: ProfileChanges) -> Result<ProfileChanges> {
    if let Some(first_name) = &changes.first_name
        && first_name.trim().is_empty()
    {
        return Err(AppError::ValidationFailed(vec!["First name can't be blank".to_string()]));
    }

    Ok(ProfileChanges {
        first_name: changes.first_name.map(|v| v.trim().to_string()),
        last_name: changes.last_name.map(non_blank),
        phone: changes.phone.map(non_blank),
    })
}
