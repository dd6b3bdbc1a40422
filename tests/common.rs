#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc, unreachable_pub)]

use rental_auth_server::AppBuilder;
use rental_auth_server::api::{self, MgmtState};
use rental_auth_server::config::{
    AuthConfig, Config, DatabaseConfig, HealthConfig, LogFormat, RateLimitConfig, RevocationConfig, ServerConfig,
    TelemetryConfig,
};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Once;
use tokio::net::TcpListener;

static INIT: Once = Once::new();

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password-123";
pub const JWT_SECRET: &str = "integration_test_secret_of_sufficient_length";

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("rental_auth_server=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    Config {
        database: DatabaseConfig {
            url: None,
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 60,
            max_lifetime_secs: 300,
            connect_retries: 1,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            mgmt_port: 0,
            shutdown_timeout_secs: 1,
            trusted_proxies: vec!["127.0.0.1/32".parse().unwrap(), "::1/128".parse().unwrap()],
        },
        auth: AuthConfig {
            jwt_secret: JWT_SECRET.to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 7,
            password_memory_kib: 1024,
            password_iterations: 1,
            bootstrap_admin_email: Some(ADMIN_EMAIL.to_string()),
            bootstrap_admin_password: Some(ADMIN_PASSWORD.to_string()),
        },
        rate_limit: RateLimitConfig { per_second: 10_000, burst: 10_000, auth_per_second: 10_000, auth_burst: 10_000 },
        revocation: RevocationConfig { sweep_interval_secs: 0 },
        health: HealthConfig { db_timeout_ms: 500 },
        telemetry: TelemetryConfig { otlp_endpoint: None, log_format: LogFormat::Text },
    }
}

#[derive(Debug)]
pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: Client,
    pub config: Config,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();

        let app = AppBuilder::new(config.clone()).build().await.expect("Failed to build app");

        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_url = format!("http://{}/api/v1", api_listener.local_addr().unwrap());
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());

        let app_router = api::app_router(&config, app.services);
        let mgmt_router = api::mgmt_router(MgmtState { health_service: app.health_service });

        tokio::spawn(async move {
            axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        Self { server_url, mgmt_url, client: Client::new(), config }
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/auth/login", self.server_url))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Logs in and returns the `data` object of the session response.
    pub async fn login_ok(&self, email: &str, password: &str) -> Value {
        let resp = self.login(email, password).await;
        assert_eq!(resp.status(), StatusCode::OK, "login for {email} should succeed");
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    pub async fn admin_token(&self) -> String {
        self.login_ok(ADMIN_EMAIL, ADMIN_PASSWORD).await["token"].as_str().unwrap().to_string()
    }

    /// Creates a user through the API as admin and returns its payload.
    pub async fn create_user(&self, admin_token: &str, email: &str, password: &str, role: &str) -> Value {
        let resp = self
            .client
            .post(format!("{}/users", self.server_url))
            .bearer_auth(admin_token)
            .json(&json!({
                "user": {
                    "email": email,
                    "password": password,
                    "first_name": "Test",
                    "last_name": "User",
                    "phone": "555-0100",
                    "role": role,
                }
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED, "creating {email} should succeed");
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Response {
        let mut req = self.client.get(format!("{}{}", self.server_url, path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.unwrap()
    }
}
