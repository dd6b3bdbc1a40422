use crate::api::rate_limit::{ClientIpKeyExtractor, Tier, TierGuard, enforce_envelope};
use crate::config::Config;
use crate::error::AppError;
use crate::services::auth_service::AuthService;
use crate::services::health_service::HealthService;
use crate::services::token_service::TokenVerifier;
use crate::services::user_service::UserService;
use axum::body::Body;
use axum::http::Request;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod health;
pub mod middleware;
pub mod rate_limit;
pub mod schemas;
pub mod users;

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub token_verifier: TokenVerifier,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub token_verifier: TokenVerifier,
}

/// Configures and returns the primary application router.
///
/// # Panics
/// Panics if the rate limiter configuration cannot be constructed.
pub fn app_router(config: &Config, services: ServiceContainer) -> Router {
    let extractor = ClientIpKeyExtractor::new(&config.server.trusted_proxies);

    let std_interval_ns = 1_000_000_000 / config.rate_limit.per_second.max(1);
    let standard_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(std_interval_ns))
            .burst_size(config.rate_limit.burst.max(1))
            .key_extractor(extractor.clone())
            .finish()
            .expect("Failed to build standard rate limiter config"),
    );

    // Auth tier: stricter limits for credential guessing targets
    let auth_interval_ns = 1_000_000_000 / config.rate_limit.auth_per_second.max(1);
    let auth_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(auth_interval_ns))
            .burst_size(config.rate_limit.auth_burst.max(1))
            .key_extractor(extractor)
            .finish()
            .expect("Failed to build auth rate limiter config"),
    );

    let state = AppState {
        auth_service: services.auth_service,
        user_service: services.user_service,
        token_verifier: services.token_verifier,
    };

    // Sensitive routes with strict limits
    let auth_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .layer(GovernorLayer::new(auth_conf))
        .layer(from_fn_with_state(TierGuard::new(Tier::Auth), enforce_envelope));

    // Standard routes
    let api_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", delete(auth::logout))
        .route("/users", get(users::index).post(users::create))
        .route("/users/{id}", get(users::show).put(users::update).patch(users::update).delete(users::destroy))
        .route("/health", get(health::status))
        .layer(GovernorLayer::new(standard_conf))
        .layer(from_fn_with_state(TierGuard::new(Tier::Standard), enforce_envelope));

    Router::new()
        .nest("/api/v1", auth_routes.merge(api_routes))
        .fallback(route_not_found)
        .layer(PropagateRequestIdLayer::new(axum::http::HeaderName::from_static("x-request-id")))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static("x-request-id"),
            middleware::MakeRequestUuidOrHeader,
        ))
        .with_state(state)
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route")
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
