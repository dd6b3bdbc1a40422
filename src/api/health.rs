use crate::api::MgmtState;
use crate::api::schemas::health::{ReadinessResponse, ServiceStatus};
use axum::{Json, http::StatusCode, response::IntoResponse, extract::State};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Public status endpoint. Does not touch storage.
pub async fn status() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: "v1",
        timestamp: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
    })
}

/// Liveness probe: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe: checks connectivity to the database.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (status_code, database) = match state.health_service.check_db().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, component = "database", "Readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "error")
        }
    };

    let response = ReadinessResponse {
        status: if status_code == StatusCode::OK { "ok" } else { "error" },
        database,
        backend: state.health_service.backend(),
    };

    (status_code, Json(response))
}
