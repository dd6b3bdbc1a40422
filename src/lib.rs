#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::database::{DbPool, PgRevocationStore, PgUserStore};
use crate::adapters::memory::{MemoryRevocationStore, MemoryUserStore};
use crate::api::ServiceContainer;
use crate::config::{Config, MIN_JWT_SECRET_LEN};
use crate::domain::auth::{JwtKeys, Password};
use crate::services::auth_service::AuthService;
use crate::services::credential_service::{CredentialService, UserStore};
use crate::services::health_service::HealthService;
use crate::services::revocation_service::{RevocationRegistry, RevocationStore};
use crate::services::token_service::{TokenIssuer, TokenVerifier};
use crate::services::user_service::UserService;
use crate::workers::RevocationSweepWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Background tasks, started explicitly once the listeners are bound.
#[derive(Debug)]
pub struct Workers {
    pub revocation_sweep: RevocationSweepWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.revocation_sweep.run(shutdown_rx))]
    }
}

#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub workers: Workers,
}

/// Wires stores and services together. Performs no I/O beyond the optional admin bootstrap.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, pool: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// # Errors
    /// Returns an error if the JWT secret is too short, the password cost is invalid,
    /// or the bootstrap admin cannot be created.
    pub async fn build(self) -> anyhow::Result<App> {
        let config = self.config;

        if config.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT secret must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        let (user_store, revocation_store): (Arc<dyn UserStore>, Arc<dyn RevocationStore>) = match &self.pool {
            Some(pool) => (Arc::new(PgUserStore::new(pool.clone())), Arc::new(PgRevocationStore::new(pool.clone()))),
            None => {
                tracing::warn!("No database configured; users and revocations are kept in memory only");
                (Arc::new(MemoryUserStore::new()), Arc::new(MemoryRevocationStore::new()))
            }
        };

        let password = Password::with_cost(config.auth.password_memory_kib, config.auth.password_iterations)?;
        let keys = JwtKeys::from_secret(&config.auth.jwt_secret);

        let credentials = CredentialService::new(user_store, password);
        let revocations = RevocationRegistry::new(revocation_store);
        let issuer = TokenIssuer::new(keys.clone(), credentials.store(), &config.auth);
        let token_verifier = TokenVerifier::new(keys, credentials.clone(), revocations.clone());
        let auth_service = AuthService::new(credentials.clone(), issuer, revocations.clone());
        let user_service = UserService::new(credentials);

        if let (Some(email), Some(password)) =
            (&config.auth.bootstrap_admin_email, &config.auth.bootstrap_admin_password)
        {
            user_service.ensure_admin(email, password).await?;
        }

        let health_service = HealthService::new(self.pool, config.health.clone());
        let workers = Workers {
            revocation_sweep: RevocationSweepWorker::new(revocations, config.revocation.sweep_interval_secs),
        };

        Ok(App {
            services: ServiceContainer { auth_service, user_service, token_verifier },
            health_service,
            workers,
        })
    }
}

/// Applies the embedded migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!().run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
            () = terminate => tracing::info!("Received SIGTERM, shutting down"),
        }

        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing so they reach the configured log sink.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line())).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());

        tracing::error!(panic.location = %location, panic.payload = %payload, "Thread panicked");
    }));
}
