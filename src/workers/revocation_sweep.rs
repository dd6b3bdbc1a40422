use crate::error::AppError;
use crate::services::revocation_service::RevocationRegistry;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::Instrument;

/// Periodically drops revocation entries whose tokens have expired on their own.
///
/// Purely storage hygiene: verification rejects expired tokens by `exp` regardless.
#[derive(Debug)]
pub struct RevocationSweepWorker {
    registry: RevocationRegistry,
    interval_secs: u64,
}

impl RevocationSweepWorker {
    #[must_use]
    pub const fn new(registry: RevocationRegistry, interval_secs: u64) -> Self {
        Self { registry, interval_secs }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.interval_secs == 0 {
            tracing::info!("Revocation sweep is disabled (interval = 0)");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep()
                        .instrument(tracing::info_span!("run_revocation_sweep"))
                        .await
                    {
                        tracing::error!(error = ?e, "Revocation sweep iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Revocation sweep loop shutting down...");
    }

    /// Deletes every entry whose token expired before now.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    #[tracing::instrument(skip(self), err, fields(expired_deleted = tracing::field::Empty))]
    pub async fn sweep(&self) -> Result<u64, AppError> {
        tracing::debug!("Running revocation sweep...");

        let count = self.registry.sweep_expired(OffsetDateTime::now_utc()).await?;
        if count > 0 {
            tracing::info!(count = %count, "Deleted expired revocation entries");
            tracing::Span::current().record("expired_deleted", count);
        }

        Ok(count)
    }
}
