use crate::domain::auth_session::{AuthSession, Authenticated};
use crate::error::{AppError, Result};
use crate::services::credential_service::CredentialService;
use crate::services::revocation_service::RevocationRegistry;
use crate::services::token_service::TokenIssuer;
use opentelemetry::{global, metrics::Counter};

#[derive(Clone, Debug)]
struct Metrics {
    login_total: Counter<u64>,
    login_failures_total: Counter<u64>,
    refresh_total: Counter<u64>,
    logout_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("rental-auth-server");
        Self {
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Total number of successful login attempts")
                .build(),
            login_failures_total: meter
                .u64_counter("auth_login_failures_total")
                .with_description("Total number of rejected login attempts")
                .build(),
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Total number of successful token rotations")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Total number of successful logout attempts")
                .build(),
        }
    }
}

/// Login, logout and refresh flows.
#[derive(Clone, Debug)]
pub struct AuthService {
    credentials: CredentialService,
    issuer: TokenIssuer,
    revocations: RevocationRegistry,
    metrics: Metrics,
}

impl AuthService {
    #[must_use]
    pub fn new(credentials: CredentialService, issuer: TokenIssuer, revocations: RevocationRegistry) -> Self {
        Self { credentials, issuer, revocations, metrics: Metrics::new() }
    }

    /// # Errors
    /// Returns `AppError::InvalidCredentials` for any credential mismatch.
    #[tracing::instrument(skip(self, email, password), err(level = "warn"))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let user = match self.credentials.authenticate(email, password).await {
            Ok(user) => user,
            Err(e) => {
                if matches!(e, AppError::InvalidCredentials) {
                    self.metrics.login_failures_total.add(1, &[]);
                }
                return Err(e);
            }
        };

        let session = self.issuer.issue(&user).await?;
        self.metrics.login_total.add(1, &[]);
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(session)
    }

    /// Revokes the presented access token and drops the user's refresh token.
    ///
    /// # Errors
    /// Returns `AppError::OperationFailed` if either write fails; the caller cannot tell which.
    #[tracing::instrument(skip(self, auth), fields(user_id = %auth.user.id), err(level = "warn"))]
    pub async fn logout(&self, auth: &Authenticated) -> Result<()> {
        let claims = &auth.claims;

        if let Err(e) = self.revocations.revoke(&claims.jti, auth.user.id, claims.expires_at()).await {
            tracing::error!(error = %e, "Failed to revoke access token");
            return Err(AppError::OperationFailed("Logout failed"));
        }

        if let Err(e) = self.credentials.store().clear_refresh_token(auth.user.id).await {
            tracing::error!(error = %e, "Failed to clear refresh token");
            return Err(AppError::OperationFailed("Logout failed"));
        }

        self.metrics.logout_total.add(1, &[]);
        tracing::info!("User logged out");
        Ok(())
    }

    /// # Errors
    /// Returns `AppError::InvalidCredentials` if the refresh token is unusable or the account is disabled.
    #[tracing::instrument(skip(self, refresh_token), err(level = "warn"))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession> {
        let session = self.issuer.exchange(refresh_token).await?;

        if !session.user.active {
            self.credentials.store().clear_refresh_token(session.user.id).await?;
            tracing::warn!(user_id = %session.user.id, "Refresh rejected: account disabled");
            return Err(AppError::InvalidCredentials);
        }

        self.metrics.refresh_total.add(1, &[]);
        Ok(session)
    }
}
