use crate::{types::HealthResponse, AppState};
use axum::{extract::State, Json};

/// Liveness check listing the retrieval components this server can run
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        components: state.orchestrator.components(),
    })
}
