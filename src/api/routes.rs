use crate::api::handlers::{health, research};
use crate::AppState;
use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

/// OpenAPI document for the HTTP surface.
#[derive(OpenApi)]
#[openapi(
    info(title = "JURIS", description = "Legal research job orchestrator"),
    paths(
        health::health,
        research::create_research,
        research::list_research,
        research::get_research,
        research::get_research_sources,
        research::delete_research,
        research::research_events,
    ),
    components(schemas(
        crate::types::CreateResearchRequest,
        crate::types::CreateResearchResponse,
        crate::types::JobSourcesResponse,
        crate::types::DeleteResearchResponse,
        crate::types::HealthResponse,
        crate::jobs::ResearchJob,
        crate::jobs::JobSummary,
        crate::jobs::JobEvent,
        crate::jobs::JobState,
        crate::research::ResearchReport,
        crate::research::SourceEntry,
    )),
    tags(
        (name = "research", description = "Research job lifecycle"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router() -> Router<AppState> {
    let api_routes = Router::new()
        .route(
            "/research",
            get(research::list_research).post(research::create_research),
        )
        .route("/research/events", get(research::research_events))
        .route(
            "/research/{id}",
            get(research::get_research).delete(research::delete_research),
        )
        .route("/research/{id}/sources", get(research::get_research_sources))
        .route("/openapi.json", get(openapi_json));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
}
