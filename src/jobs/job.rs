//! The research job record and its state machine.

use crate::research::report::{ReportOptions, ResearchReport};
use crate::retrieval::{CaseExcerpt, RetrievalComponent, RetrievalHits, SearchFilters, WebDocument};
use crate::types::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Job identifier, rendered as `research_<32 hex digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(format!("research_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Retrieving,
    Synthesizing,
    Completed,
    Failed,
}

impl JobState {
    /// Legal edges: pending → retrieving → synthesizing → {completed, failed},
    /// plus retrieving → failed.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Retrieving)
                | (JobState::Retrieving, JobState::Synthesizing)
                | (JobState::Retrieving, JobState::Failed)
                | (JobState::Synthesizing, JobState::Completed)
                | (JobState::Synthesizing, JobState::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Retrieving => "retrieving",
            JobState::Synthesizing => "synthesizing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobState::Pending),
            "retrieving" => Ok(JobState::Retrieving),
            "synthesizing" => Ok(JobState::Synthesizing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(AppError::Internal(format!("Unknown job state '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComponentErrorKind {
    Failed,
    TimedOut,
}

/// Why a requested component produced no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ComponentError {
    pub component: RetrievalComponent,
    pub kind: ComponentErrorKind,
    pub message: String,
}

impl ComponentError {
    pub fn failed(component: RetrievalComponent, message: impl Into<String>) -> Self {
        Self {
            component,
            kind: ComponentErrorKind::Failed,
            message: message.into(),
        }
    }

    pub fn timed_out(component: RetrievalComponent, message: impl Into<String>) -> Self {
        Self {
            component,
            kind: ComponentErrorKind::TimedOut,
            message: message.into(),
        }
    }

    pub fn describe(&self) -> String {
        match self.kind {
            ComponentErrorKind::Failed => format!("failed ({})", self.message),
            ComponentErrorKind::TimedOut => format!("timed out ({})", self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    Synthesis,
    AllComponentsFailed,
    Internal,
}

/// Terminal error descriptor of a failed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
    #[serde(default)]
    pub component_errors: Vec<ComponentError>,
}

impl JobError {
    pub fn synthesis(message: impl Into<String>, component_errors: Vec<ComponentError>) -> Self {
        Self {
            kind: JobErrorKind::Synthesis,
            message: message.into(),
            component_errors,
        }
    }

    pub fn all_components_failed(component_errors: Vec<ComponentError>) -> Self {
        let detail = component_errors
            .iter()
            .map(|e| format!("{} {}", e.component, e.describe()))
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            kind: JobErrorKind::AllComponentsFailed,
            message: format!("All retrieval components failed: {}", detail),
            component_errors,
        }
    }

    pub fn internal(message: impl Into<String>, component_errors: Vec<ComponentError>) -> Self {
        Self {
            kind: JobErrorKind::Internal,
            message: message.into(),
            component_errors,
        }
    }
}

impl From<&JobError> for AppError {
    fn from(error: &JobError) -> Self {
        match error.kind {
            JobErrorKind::Synthesis => AppError::Synthesis(error.message.clone()),
            JobErrorKind::AllComponentsFailed => AppError::AllComponentsFailed(error.message.clone()),
            JobErrorKind::Internal => AppError::Internal(error.message.clone()),
        }
    }
}

/// A research job.
///
/// Fields are read through accessors; every write goes through a method that
/// checks the state machine and refreshes `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResearchJob {
    id: JobId,
    query: String,
    filters: SearchFilters,
    requested_components: Vec<RetrievalComponent>,
    options: ReportOptions,
    #[serde(default)]
    advisories: Vec<String>,
    state: JobState,
    case_law_result: Option<Vec<CaseExcerpt>>,
    web_result: Option<Vec<WebDocument>>,
    #[serde(default)]
    component_errors: Vec<ComponentError>,
    report: Option<ResearchReport>,
    error: Option<JobError>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl ResearchJob {
    /// Create a `pending` job.
    pub fn new(
        id: JobId,
        query: impl Into<String>,
        filters: SearchFilters,
        mut requested_components: Vec<RetrievalComponent>,
        options: ReportOptions,
        advisories: Vec<String>,
    ) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(AppError::InvalidRequest("Query must not be empty".to_string()));
        }
        requested_components.sort();
        requested_components.dedup();
        if requested_components.is_empty() {
            return Err(AppError::InvalidRequest(
                "At least one retrieval component must be requested".to_string(),
            ));
        }
        filters.validate()?;

        let now = Utc::now();
        Ok(Self {
            id,
            query,
            filters,
            requested_components,
            options,
            advisories,
            state: JobState::Pending,
            case_law_result: None,
            web_result: None,
            component_errors: Vec::new(),
            report: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filters(&self) -> &SearchFilters {
        &self.filters
    }

    pub fn requested_components(&self) -> &[RetrievalComponent] {
        &self.requested_components
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    pub fn advisories(&self) -> &[String] {
        &self.advisories
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn case_law_result(&self) -> Option<&[CaseExcerpt]> {
        self.case_law_result.as_deref()
    }

    pub fn web_result(&self) -> Option<&[WebDocument]> {
        self.web_result.as_deref()
    }

    pub fn component_errors(&self) -> &[ComponentError] {
        &self.component_errors
    }

    pub fn report(&self) -> Option<&ResearchReport> {
        self.report.as_ref()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether `component` has a recorded result or error.
    pub fn has_outcome(&self, component: RetrievalComponent) -> bool {
        let has_result = match component {
            RetrievalComponent::CaseLaw => self.case_law_result.is_some(),
            RetrievalComponent::Web => self.web_result.is_some(),
        };
        has_result || self.component_errors.iter().any(|e| e.component == component)
    }

    /// Requested components still waiting for an outcome.
    pub fn pending_components(&self) -> Vec<RetrievalComponent> {
        self.requested_components
            .iter()
            .copied()
            .filter(|c| !self.has_outcome(*c))
            .collect()
    }

    /// Requested components that produced a result.
    pub fn succeeded_components(&self) -> Vec<RetrievalComponent> {
        self.requested_components
            .iter()
            .copied()
            .filter(|c| match c {
                RetrievalComponent::CaseLaw => self.case_law_result.is_some(),
                RetrievalComponent::Web => self.web_result.is_some(),
            })
            .collect()
    }

    // ============= Mutations =============

    /// Refresh `updated_at`, keeping it strictly increasing.
    fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::nanoseconds(1)
        };
    }

    fn transition(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::IllegalTransition(format!(
                "job {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        self.touch();
        Ok(())
    }

    fn check_component_writable(&self, component: RetrievalComponent) -> Result<()> {
        if self.state != JobState::Retrieving {
            return Err(AppError::IllegalTransition(format!(
                "job {} is {}; retrieval outcomes can only be recorded while retrieving",
                self.id, self.state
            )));
        }
        if !self.requested_components.contains(&component) {
            return Err(AppError::IllegalTransition(format!(
                "job {} did not request component {}",
                self.id, component
            )));
        }
        if self.has_outcome(component) {
            return Err(AppError::IllegalTransition(format!(
                "job {} already has an outcome for {}",
                self.id, component
            )));
        }
        Ok(())
    }

    pub fn begin_retrieval(&mut self) -> Result<()> {
        self.transition(JobState::Retrieving)
    }

    /// Attach a component's hits. Each component is written at most once.
    pub fn record_hits(&mut self, hits: RetrievalHits) -> Result<()> {
        self.check_component_writable(hits.component())?;
        match hits {
            RetrievalHits::CaseLaw(excerpts) => self.case_law_result = Some(excerpts),
            RetrievalHits::Web(documents) => self.web_result = Some(documents),
        }
        self.touch();
        Ok(())
    }

    pub fn record_component_error(&mut self, error: ComponentError) -> Result<()> {
        self.check_component_writable(error.component)?;
        self.component_errors.push(error);
        self.touch();
        Ok(())
    }

    /// Move to `synthesizing` once every component has an outcome and at least one succeeded.
    pub fn begin_synthesis(&mut self) -> Result<()> {
        if self.state == JobState::Retrieving {
            if !self.pending_components().is_empty() {
                return Err(AppError::IllegalTransition(format!(
                    "job {} still has components without an outcome",
                    self.id
                )));
            }
            if self.succeeded_components().is_empty() {
                return Err(AppError::IllegalTransition(format!(
                    "job {} has no successful retrieval to synthesize",
                    self.id
                )));
            }
        }
        self.transition(JobState::Synthesizing)
    }

    pub fn complete(&mut self, report: ResearchReport) -> Result<()> {
        self.transition(JobState::Completed)?;
        self.report = Some(report);
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    /// Fail the job. From `retrieving` this is only legal when every
    /// requested component failed.
    pub fn fail(&mut self, error: JobError) -> Result<()> {
        if self.state == JobState::Retrieving {
            let all_failed = self.pending_components().is_empty()
                && self.succeeded_components().is_empty();
            if error.kind != JobErrorKind::AllComponentsFailed || !all_failed {
                return Err(AppError::IllegalTransition(format!(
                    "job {} can only fail during retrieval when every component failed",
                    self.id
                )));
            }
        }
        self.transition(JobState::Failed)?;
        self.error = Some(error);
        self.completed_at = Some(self.updated_at);
        Ok(())
    }
}

/// Compact view of a job for listings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobSummary {
    pub id: JobId,
    pub query: String,
    pub state: JobState,
    pub requested_components: Vec<RetrievalComponent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&ResearchJob> for JobSummary {
    fn from(job: &ResearchJob) -> Self {
        Self {
            id: job.id.clone(),
            query: job.query.clone(),
            state: job.state,
            requested_components: job.requested_components.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Created,
    Transitioned,
    ComponentFinished,
}

/// Change notification published on the orchestrator's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobEvent {
    pub job_id: JobId,
    pub kind: JobEventKind,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<RetrievalComponent>,
    pub updated_at: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(kind: JobEventKind, job: &ResearchJob) -> Self {
        Self {
            job_id: job.id.clone(),
            kind,
            state: job.state,
            component: None,
            updated_at: job.updated_at,
        }
    }

    pub fn with_component(mut self, component: RetrievalComponent) -> Self {
        self.component = Some(component);
        self
    }
}
