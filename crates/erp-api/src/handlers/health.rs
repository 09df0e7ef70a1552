use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::response::ok;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Liveness - GET /api/v1/health
pub async fn health_check() -> Json<crate::response::ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness - GET /api/v1/health/ready
pub async fn readiness_check(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    state.readiness.check().await.map_err(ApiError::Unavailable)?;
    Ok(ok(HealthResponse {
        status: "ready",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
