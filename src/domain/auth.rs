use crate::domain::user::{Role, User};
use crate::error::{AppError, AuthFailure, Result};
use argon2::{
    Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// The only algorithm accepted for access tokens. Never read from the token header.
pub const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub jti: String,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    #[must_use]
    pub fn for_user(user: &User, issued_at: OffsetDateTime, ttl_secs: u64) -> Self {
        let iat = issued_at.unix_timestamp();
        Self {
            jti: Uuid::new_v4().to_string(),
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            iat,
            exp: iat.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX)),
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.exp).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// Signs the claims with the server secret.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if encoding fails.
    pub fn encode(&self, keys: &JwtKeys) -> Result<Jwt> {
        encode(&Header::new(JWT_ALGORITHM), self, &keys.encoding).map(Jwt).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign access token");
            AppError::Internal
        })
    }

    /// Decodes and validates a raw token: structure, signature, then expiry.
    ///
    /// # Errors
    /// Returns the `AuthFailure` describing the first check that failed.
    pub fn decode(token: &str, keys: &JwtKeys) -> std::result::Result<Self, AuthFailure> {
        let claims = decode::<Self>(token, &keys.decoding, &keys.validation).map(|data| data.claims).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthFailure::BadSignature,
                ErrorKind::ExpiredSignature => AuthFailure::Expired,
                _ => AuthFailure::MalformedToken,
            },
        )?;

        // jsonwebtoken accepts exp == now; a token is dead at its exp second.
        if claims.exp <= OffsetDateTime::now_utc().unix_timestamp() {
            return Err(AuthFailure::Expired);
        }

        Ok(claims)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jwt(pub String);

impl Jwt {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Signing and verification material derived from the process-wide secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtKeys {
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtKeys").field("algorithm", &JWT_ALGORITHM).finish_non_exhaustive()
    }
}

/// Argon2id hashing with configurable cost.
#[derive(Debug, Clone)]
pub struct Password {
    params: Params,
}

impl Password {
    /// # Errors
    /// Returns `AppError::Internal` if the cost parameters are out of range.
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None).map_err(|e| {
            tracing::error!(error = %e, "Invalid password hashing parameters");
            AppError::Internal
        })?;
        Ok(Self { params })
    }

    /// # Errors
    /// Returns `AppError::Internal` if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let password_hash = argon2.hash_password(password.as_bytes(), &salt).map_err(|_| AppError::Internal)?.to_string();
        Ok(password_hash)
    }

    /// Cost parameters are read back from the stored PHC string.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if the stored hash cannot be parsed.
    pub fn verify(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AppError::Internal)?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }
}

pub struct OpaqueToken;

impl OpaqueToken {
    /// Generates a cryptographically secure random string (32 bytes -> Base64).
    #[must_use]
    pub fn generate() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Only this digest is persisted.
    #[must_use]
    pub fn hash(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}
