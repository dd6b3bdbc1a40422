//! Token issuance and per-request verification.

use crate::config::AuthConfig;
use crate::domain::auth::{AccessClaims, Jwt, JwtKeys, OpaqueToken};
use crate::domain::auth_session::{AuthSession, Authenticated};
use crate::domain::user::User;
use crate::error::{AppError, AuthFailure, Result};
use crate::services::credential_service::{CredentialService, UserStore};
use crate::services::revocation_service::RevocationRegistry;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
pub struct TokenIssuer {
    keys: JwtKeys,
    store: Arc<dyn UserStore>,
    access_token_ttl_secs: u64,
    refresh_token_ttl: time::Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(keys: JwtKeys, store: Arc<dyn UserStore>, config: &AuthConfig) -> Self {
        Self {
            keys,
            store,
            access_token_ttl_secs: config.access_token_ttl_secs,
            refresh_token_ttl: time::Duration::days(config.refresh_token_ttl_days),
        }
    }

    /// Issues an access + refresh pair, replacing whatever refresh token the user held.
    ///
    /// # Errors
    /// Returns an error if signing fails or the refresh token cannot be stored.
    #[tracing::instrument(err, skip(self, user), fields(user_id = %user.id))]
    pub async fn issue(&self, user: &User) -> Result<AuthSession> {
        let now = OffsetDateTime::now_utc();
        let (claims, token) = self.sign(user, now)?;

        let refresh_token = OpaqueToken::generate();
        let refresh_expires_at = now + self.refresh_token_ttl;
        self.store.replace_refresh_token(user.id, &OpaqueToken::hash(&refresh_token), refresh_expires_at).await?;

        Ok(AuthSession {
            user: user.clone(),
            token,
            refresh_token,
            expires_at: claims.expires_at(),
            refresh_expires_at,
        })
    }

    /// Trades a refresh token for a new pair. The presented token is consumed.
    ///
    /// # Errors
    /// Returns `AppError::InvalidCredentials` if the token is unknown, already used, or expired.
    #[tracing::instrument(err(level = "warn"), skip(self, refresh_token), fields(user_id = tracing::field::Empty))]
    pub async fn exchange(&self, refresh_token: &str) -> Result<AuthSession> {
        let now = OffsetDateTime::now_utc();
        let new_refresh_token = OpaqueToken::generate();
        let refresh_expires_at = now + self.refresh_token_ttl;

        let user = self
            .store
            .rotate_refresh_token(
                &OpaqueToken::hash(refresh_token),
                &OpaqueToken::hash(&new_refresh_token),
                refresh_expires_at,
            )
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        let (claims, token) = self.sign(&user, now)?;

        Ok(AuthSession {
            user,
            token,
            refresh_token: new_refresh_token,
            expires_at: claims.expires_at(),
            refresh_expires_at,
        })
    }

    fn sign(&self, user: &User, now: OffsetDateTime) -> Result<(AccessClaims, Jwt)> {
        let claims = AccessClaims::for_user(user, now, self.access_token_ttl_secs);
        let token = claims.encode(&self.keys)?;
        Ok((claims, token))
    }
}

#[derive(Clone, Debug)]
struct VerifierMetrics {
    failures_total: Counter<u64>,
}

impl VerifierMetrics {
    fn new() -> Self {
        let meter = global::meter("rental-auth-server");
        Self {
            failures_total: meter
                .u64_counter("auth_verify_failures_total")
                .with_description("Rejected bearer tokens by reason")
                .build(),
        }
    }
}

/// Resolves a bearer token to its user. Read-only against both stores.
#[derive(Clone, Debug)]
pub struct TokenVerifier {
    keys: JwtKeys,
    credentials: CredentialService,
    revocations: RevocationRegistry,
    metrics: VerifierMetrics,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(keys: JwtKeys, credentials: CredentialService, revocations: RevocationRegistry) -> Self {
        Self { keys, credentials, revocations, metrics: VerifierMetrics::new() }
    }

    /// Checks, in order: structure, signature, expiry, revocation, user existence.
    ///
    /// # Errors
    /// Returns `AppError::Auth` with the failing check, or a store error.
    pub async fn verify(&self, raw_token: &str) -> Result<Authenticated> {
        let claims = AccessClaims::decode(raw_token, &self.keys).map_err(|reason| self.reject(reason))?;

        if self.revocations.is_revoked(&claims.jti).await? {
            return Err(self.reject(AuthFailure::Revoked));
        }

        let user =
            self.credentials.find_by_id(claims.user_id).await?.ok_or_else(|| self.reject(AuthFailure::UserNotFound))?;

        Ok(Authenticated { user, claims })
    }

    fn reject(&self, reason: AuthFailure) -> AppError {
        self.metrics.failures_total.add(1, &[KeyValue::new("reason", reason.as_str())]);
        AppError::Auth(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryRevocationStore, MemoryUserStore};
    use crate::domain::auth::Password;
    use crate::domain::user::{NewUser, Role};
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "unit_test_secret_with_at_least_32_bytes";

    struct Fixture {
        issuer: TokenIssuer,
        verifier: TokenVerifier,
        revocations: RevocationRegistry,
        users: Arc<MemoryUserStore>,
        user: User,
    }

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: SECRET.to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 7,
            password_memory_kib: 1024,
            password_iterations: 1,
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }

    async fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserStore::new());
        let revocations = RevocationRegistry::new(Arc::new(MemoryRevocationStore::new()));
        let credentials = CredentialService::new(
            Arc::clone(&users) as Arc<dyn UserStore>,
            Password::with_cost(1024, 1).unwrap(),
        );
        let keys = JwtKeys::from_secret(SECRET);
        let issuer = TokenIssuer::new(keys.clone(), credentials.store(), &auth_config());
        let verifier = TokenVerifier::new(keys, credentials, revocations.clone());

        let user = users
            .create(NewUser {
                email: "owner@example.com".into(),
                password_hash: "$argon2id$placeholder".into(),
                first_name: "Olive".into(),
                last_name: None,
                phone: None,
                role: Role::Owner,
            })
            .await
            .unwrap();

        Fixture { issuer, verifier, revocations, users, user }
    }

    #[tokio::test]
    async fn test_issued_token_verifies_to_user() {
        let f = fixture().await;
        let session = f.issuer.issue(&f.user).await.unwrap();

        let auth = f.verifier.verify(session.token.as_str()).await.unwrap();
        assert_eq!(auth.user.id, f.user.id);
        assert_eq!(auth.claims.role, Role::Owner);
        assert_eq!(auth.claims.email, "owner@example.com");
        assert!(session.refresh_expires_at > session.expires_at);
    }

    #[tokio::test]
    async fn test_issue_stores_only_refresh_hash() {
        let f = fixture().await;
        let session = f.issuer.issue(&f.user).await.unwrap();

        let stored = f.users.find_by_id(f.user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token_hash, Some(OpaqueToken::hash(&session.refresh_token)));
        assert_ne!(stored.refresh_token_hash.as_deref(), Some(session.refresh_token.as_str()));
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_refresh_token() {
        let f = fixture().await;
        let first = f.issuer.issue(&f.user).await.unwrap();
        let second = f.issuer.issue(&f.user).await.unwrap();

        assert!(matches!(f.issuer.exchange(&first.refresh_token).await, Err(AppError::InvalidCredentials)));
        assert!(f.issuer.exchange(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_exchange_consumes_token() {
        let f = fixture().await;
        let session = f.issuer.issue(&f.user).await.unwrap();

        let rotated = f.issuer.exchange(&session.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, session.refresh_token);
        assert!(f.verifier.verify(rotated.token.as_str()).await.is_ok());

        assert!(matches!(f.issuer.exchange(&session.refresh_token).await, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_verify_revoked() {
        let f = fixture().await;
        let session = f.issuer.issue(&f.user).await.unwrap();
        let auth = f.verifier.verify(session.token.as_str()).await.unwrap();

        f.revocations.revoke(&auth.claims.jti, f.user.id, auth.claims.expires_at()).await.unwrap();

        let result = f.verifier.verify(session.token.as_str()).await;
        assert!(matches!(result, Err(AppError::Auth(AuthFailure::Revoked))));
    }

    #[tokio::test]
    async fn test_verify_expired() {
        let f = fixture().await;
        let issued = OffsetDateTime::now_utc() - time::Duration::hours(3);
        let token = AccessClaims::for_user(&f.user, issued, 3600).encode(&JwtKeys::from_secret(SECRET)).unwrap();

        let result = f.verifier.verify(token.as_str()).await;
        assert!(matches!(result, Err(AppError::Auth(AuthFailure::Expired))));
    }

    #[tokio::test]
    async fn test_verify_deleted_user() {
        let f = fixture().await;
        let session = f.issuer.issue(&f.user).await.unwrap();
        f.users.delete(f.user.id).await.unwrap();

        let result = f.verifier.verify(session.token.as_str()).await;
        assert!(matches!(result, Err(AppError::Auth(AuthFailure::UserNotFound))));
    }

    #[tokio::test]
    async fn test_verify_forged_and_malformed() {
        let f = fixture().await;
        let claims = AccessClaims::for_user(&f.user, OffsetDateTime::now_utc(), 3600);
        let forged =
            encode(&Header::default(), &claims, &EncodingKey::from_secret(b"attacker_controlled_secret_value!!")).unwrap();

        assert!(matches!(f.verifier.verify(&forged).await, Err(AppError::Auth(AuthFailure::BadSignature))));
        assert!(matches!(f.verifier.verify("garbage").await, Err(AppError::Auth(AuthFailure::MalformedToken))));
    }
}
