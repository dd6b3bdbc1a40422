pub mod records;
pub mod revoked_token_repo;
pub mod user_repo;

pub use revoked_token_repo::PgRevocationStore;
pub use user_repo::PgUserStore;

use crate::config::DatabaseConfig;
use backon::{ExponentialBuilder, Retryable};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub type DbPool = Pool<Postgres>;

/// Initializes the database connection pool, retrying while the database comes up.
///
/// # Errors
/// Returns `sqlx::Error` if the connection still fails after the configured retries.
pub async fn init_pool(config: &DatabaseConfig, url: &str) -> Result<DbPool, sqlx::Error> {
    let options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs));

    let retry_strategy = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(10))
        .with_max_times(config.connect_retries);

    (|| options.clone().connect(url))
        .retry(retry_strategy)
        .when(|e| !matches!(e, sqlx::Error::Configuration(_)))
        .notify(|e, duration| {
            tracing::warn!(error = %e, "Database connection failed, retrying in {:?}", duration);
        })
        .await
}
