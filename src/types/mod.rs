use crate::jobs::JobState;
use crate::research::report::SourceEntry;
use crate::retrieval::RetrievalComponent;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============= API Request/Response Types =============

/// Body of `POST /api/research`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateResearchRequest {
    /// The legal research question
    pub query: String,
    /// Retrieval sources to use (`case_law`, `web`). Defaults to both.
    #[serde(default = "default_components")]
    pub components: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_start: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_end: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
}

fn default_components() -> Vec<String> {
    vec!["case_law".to_string(), "web".to_string()]
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateResearchResponse {
    pub job_id: String,
    pub state: JobState,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobSourcesResponse {
    pub job_id: String,
    pub state: JobState,
    pub sources: Vec<SourceEntry>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResearchResponse {
    pub job_id: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub components: Vec<RetrievalComponent>,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate job id: {0}")]
    DuplicateId(String),

    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Retrieval error ({component}): {message}")]
    Retrieval {
        component: RetrievalComponent,
        message: String,
    },

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("All retrieval components failed: {0}")]
    AllComponentsFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable name of the error variant.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::NotFound(_) => "not_found",
            AppError::DuplicateId(_) => "duplicate_id",
            AppError::IllegalTransition(_) => "illegal_transition",
            AppError::Conflict(_) => "conflict",
            AppError::Retrieval { .. } => "retrieval_error",
            AppError::Synthesis(_) => "synthesis_error",
            AppError::AllComponentsFailed(_) => "all_components_failed",
            AppError::Database(_) => "database_error",
            AppError::LLM(_) => "llm_error",
            AppError::Configuration(_) => "configuration_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn retrieval(component: RetrievalComponent, message: impl Into<String>) -> Self {
        AppError::Retrieval {
            component,
            message: message.into(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateId(_) | AppError::IllegalTransition(_) | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::Retrieval { .. }
            | AppError::Synthesis(_)
            | AppError::AllComponentsFailed(_)
            | AppError::LLM(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
