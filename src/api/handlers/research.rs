use crate::{
    jobs::{JobEvent, JobId, JobState, JobSummary, ResearchJob},
    research::{report::build_sources, ReportFormat, ReportLength, ReportOptions, ResearchRequest},
    retrieval::{RetrievalComponent, SearchFilters},
    types::{
        CreateResearchRequest, CreateResearchResponse, DeleteResearchResponse, JobSourcesResponse,
        Result,
    },
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;

/// Turn the wire request into an orchestrator request.
fn to_research_request(payload: CreateResearchRequest) -> Result<ResearchRequest> {
    let components = payload
        .components
        .iter()
        .map(|c| c.parse::<RetrievalComponent>())
        .collect::<Result<Vec<_>>>()?;

    let options = ReportOptions {
        format: payload
            .format
            .as_deref()
            .map(str::parse::<ReportFormat>)
            .transpose()?
            .unwrap_or_default(),
        length: payload
            .length
            .as_deref()
            .map(str::parse::<ReportLength>)
            .transpose()?
            .unwrap_or_default(),
    };

    Ok(ResearchRequest::new(payload.query)
        .with_components(components)
        .with_filters(SearchFilters::new(payload.year_start, payload.year_end))
        .with_options(options))
}

/// Submit a research job
#[utoipa::path(
    post,
    path = "/api/research",
    request_body = CreateResearchRequest,
    responses(
        (status = 202, description = "Job accepted", body = CreateResearchResponse),
        (status = 400, description = "Invalid request")
    ),
    tag = "research"
)]
pub async fn create_research(
    State(state): State<AppState>,
    Json(payload): Json<CreateResearchRequest>,
) -> Result<(StatusCode, Json<CreateResearchResponse>)> {
    let request = to_research_request(payload)?;
    let job_id = state.orchestrator.submit(request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateResearchResponse {
            job_id: job_id.to_string(),
            state: JobState::Pending,
            message: format!("Research job accepted; poll /api/research/{}", job_id),
        }),
    ))
}

/// List research jobs, most recent first
#[utoipa::path(
    get,
    path = "/api/research",
    responses(
        (status = 200, description = "Jobs listed", body = Vec<JobSummary>)
    ),
    tag = "research"
)]
pub async fn list_research(State(state): State<AppState>) -> Result<Json<Vec<JobSummary>>> {
    let jobs = state.orchestrator.list_jobs().await?;
    Ok(Json(jobs.iter().map(JobSummary::from).collect()))
}

/// Get a job snapshot, including partial results while it runs
#[utoipa::path(
    get,
    path = "/api/research/{id}",
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job found", body = ResearchJob),
        (status = 404, description = "Unknown job")
    ),
    tag = "research"
)]
pub async fn get_research(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResearchJob>> {
    let job = state.orchestrator.get_status(&JobId::from(id)).await?;
    Ok(Json(job))
}

/// Sources table for a job, built from whatever retrieval has produced so far
#[utoipa::path(
    get,
    path = "/api/research/{id}/sources",
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Sources listed", body = JobSourcesResponse),
        (status = 404, description = "Unknown job")
    ),
    tag = "research"
)]
pub async fn get_research_sources(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobSourcesResponse>> {
    let job = state.orchestrator.get_status(&JobId::from(id)).await?;
    let sources = build_sources(
        job.case_law_result().unwrap_or_default(),
        job.web_result().unwrap_or_default(),
    );

    Ok(Json(JobSourcesResponse {
        job_id: job.id().to_string(),
        state: job.state(),
        sources,
    }))
}

/// Delete a finished job
#[utoipa::path(
    delete,
    path = "/api/research/{id}",
    params(("id" = String, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job deleted", body = DeleteResearchResponse),
        (status = 404, description = "Unknown job"),
        (status = 409, description = "Job is still running")
    ),
    tag = "research"
)]
pub async fn delete_research(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResearchResponse>> {
    let job_id = JobId::from(id);
    state.orchestrator.delete_job(&job_id).await?;

    Ok(Json(DeleteResearchResponse {
        job_id: job_id.to_string(),
        deleted: true,
    }))
}

/// Server-sent stream of job events
#[utoipa::path(
    get,
    path = "/api/research/events",
    responses(
        (status = 200, description = "text/event-stream of JobEvent payloads", body = JobEvent)
    ),
    tag = "research"
)]
pub async fn research_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut receiver = state.orchestrator.subscribe();

    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => match Event::default().event("job").json_data(&event) {
                    Ok(sse_event) => yield Ok::<Event, Infallible>(sse_event),
                    Err(e) => tracing::warn!(error = %e, "Failed to encode job event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    yield Ok(Event::default().event("lagged").data(skipped.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
