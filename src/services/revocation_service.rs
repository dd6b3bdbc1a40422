use crate::domain::revocation::RevocationEntry;
use crate::error::Result;
use async_trait::async_trait;
use opentelemetry::{global, metrics::Counter};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Durable set of revoked token ids.
///
/// `contains` must observe every `insert` that has already returned; implementations backed by
/// replicated storage have to serve it from the primary.
#[async_trait]
pub trait RevocationStore: Send + Sync + std::fmt::Debug {
    /// Returns `false` if the jti was already present (not an error).
    async fn insert(&self, entry: &RevocationEntry) -> Result<bool>;

    async fn contains(&self, jti: &str) -> Result<bool>;

    /// Deletes entries whose token expired strictly before `now`.
    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64>;
}

#[derive(Clone, Debug)]
struct Metrics {
    revoked_total: Counter<u64>,
    swept_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("rental-auth-server");
        Self {
            revoked_total: meter
                .u64_counter("revocation_entries_created_total")
                .with_description("Access tokens revoked before their natural expiry")
                .build(),
            swept_total: meter
                .u64_counter("revocation_swept_total")
                .with_description("Revocation entries removed after their token expired")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RevocationRegistry {
    store: Arc<dyn RevocationStore>,
    metrics: Metrics,
}

impl RevocationRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn RevocationStore>) -> Self {
        Self { store, metrics: Metrics::new() }
    }

    /// Idempotent: revoking the same jti twice leaves a single entry.
    ///
    /// # Errors
    /// Returns an error if the store rejects the write.
    #[tracing::instrument(level = "debug", skip(self, jti), fields(user_id = %user_id), err)]
    pub async fn revoke(&self, jti: &str, user_id: Uuid, expires_at: OffsetDateTime) -> Result<()> {
        let entry = RevocationEntry { jti: jti.to_string(), user_id, expires_at };
        if self.store.insert(&entry).await? {
            self.metrics.revoked_total.add(1, &[]);
        } else {
            tracing::debug!("Token already revoked");
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error if the store is unavailable. Callers must treat that as a failure,
    /// never as "not revoked".
    pub async fn is_revoked(&self, jti: &str) -> Result<bool> {
        self.store.contains(jti).await
    }

    /// # Errors
    /// Returns an error if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn sweep_expired(&self, now: OffsetDateTime) -> Result<u64> {
        let count = self.store.delete_expired(now).await?;
        if count > 0 {
            self.metrics.swept_total.add(count, &[]);
        }
        Ok(count)
    }
}
