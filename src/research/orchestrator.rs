//! Research job orchestration
//!
//! The [`Orchestrator`] owns the lifecycle of every research job:
//!
//! ```text
//! pending → retrieving → synthesizing → completed
//!               │              └──────→ failed
//!               └─────────────────────→ failed   (every component failed)
//! ```
//!
//! Submission validates the request, stores a `pending` job and returns its id
//! immediately. Execution runs on a spawned task: retrieval agents run
//! concurrently on a [`JoinSet`], each under its own timeout, and their
//! outcomes are written to the job as they arrive. Synthesis runs once after
//! the last retrieval outcome is recorded.

use super::query::{validate_query, QueryAdvisor};
use super::report::{coverage_notes, ReportOptions};
use super::synthesis::{SynthesisAgent, SynthesisRequest};
use crate::jobs::{
    mutator, ComponentError, InMemoryJobStore, JobError, JobEvent, JobEventKind, JobId, JobMutator,
    JobState, JobStore, ResearchJob,
};
use crate::retrieval::{RetrievalAgent, RetrievalComponent, RetrievalHits, SearchFilters};
use crate::types::{AppError, Result};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinSet;
use tokio::time::timeout;

pub const DEFAULT_RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A validated-on-submit research request.
#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub query: String,
    pub filters: SearchFilters,
    pub components: Vec<RetrievalComponent>,
    pub options: ReportOptions,
}

impl ResearchRequest {
    /// Request every component with default filters and options.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: SearchFilters::default(),
            components: RetrievalComponent::ALL.to_vec(),
            options: ReportOptions::default(),
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_components(mut self, components: Vec<RetrievalComponent>) -> Self {
        self.components = components;
        self
    }

    pub fn with_options(mut self, options: ReportOptions) -> Self {
        self.options = options;
        self
    }
}

struct Inner {
    store: Arc<dyn JobStore>,
    agents: HashMap<RetrievalComponent, Arc<dyn RetrievalAgent>>,
    synthesizer: Arc<dyn SynthesisAgent>,
    retrieval_timeouts: HashMap<RetrievalComponent, Duration>,
    default_retrieval_timeout: Duration,
    synthesis_timeout: Duration,
    advisor: QueryAdvisor,
    events: broadcast::Sender<JobEvent>,
}

/// Drives research jobs. Cheap to clone; clones share the same store,
/// agents and event stream.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

pub struct OrchestratorBuilder {
    store: Option<Arc<dyn JobStore>>,
    agents: HashMap<RetrievalComponent, Arc<dyn RetrievalAgent>>,
    synthesizer: Option<Arc<dyn SynthesisAgent>>,
    retrieval_timeouts: HashMap<RetrievalComponent, Duration>,
    default_retrieval_timeout: Duration,
    synthesis_timeout: Duration,
    advisor: QueryAdvisor,
    event_capacity: usize,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            store: None,
            agents: HashMap::new(),
            synthesizer: None,
            retrieval_timeouts: HashMap::new(),
            default_retrieval_timeout: DEFAULT_RETRIEVAL_TIMEOUT,
            synthesis_timeout: DEFAULT_SYNTHESIS_TIMEOUT,
            advisor: QueryAdvisor::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl OrchestratorBuilder {
    /// Job store to use. Defaults to an [`InMemoryJobStore`].
    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bind an agent to the component it serves, replacing any earlier binding.
    pub fn agent(mut self, agent: Arc<dyn RetrievalAgent>) -> Self {
        self.agents.insert(agent.component(), agent);
        self
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn SynthesisAgent>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn retrieval_timeout(mut self, component: RetrievalComponent, limit: Duration) -> Self {
        self.retrieval_timeouts.insert(component, limit);
        self
    }

    /// Timeout for components without a specific one.
    pub fn default_retrieval_timeout(mut self, limit: Duration) -> Self {
        self.default_retrieval_timeout = limit;
        self
    }

    pub fn synthesis_timeout(mut self, limit: Duration) -> Self {
        self.synthesis_timeout = limit;
        self
    }

    pub fn advisor(mut self, advisor: QueryAdvisor) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let synthesizer = self.synthesizer.ok_or_else(|| {
            AppError::Configuration("Orchestrator requires a synthesis agent".to_string())
        })?;
        if self.agents.is_empty() {
            return Err(AppError::Configuration(
                "Orchestrator requires at least one retrieval agent".to_string(),
            ));
        }
        let zero_timeout = self.synthesis_timeout.is_zero()
            || self.default_retrieval_timeout.is_zero()
            || self.retrieval_timeouts.values().any(|t| t.is_zero());
        if zero_timeout {
            return Err(AppError::Configuration(
                "Timeouts must be greater than zero".to_string(),
            ));
        }

        let (events, _) = broadcast::channel(self.event_capacity.max(1));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryJobStore::new()) as Arc<dyn JobStore>);

        Ok(Orchestrator {
            inner: Arc::new(Inner {
                store,
                agents: self.agents,
                synthesizer,
                retrieval_timeouts: self.retrieval_timeouts,
                default_retrieval_timeout: self.default_retrieval_timeout,
                synthesis_timeout: self.synthesis_timeout,
                advisor: self.advisor,
                events,
            }),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Components with a bound agent, in canonical order.
    pub fn components(&self) -> Vec<RetrievalComponent> {
        let mut components: Vec<_> = self.inner.agents.keys().copied().collect();
        components.sort();
        components
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.inner.store
    }

    /// Validate and register a job, then start executing it in the background.
    ///
    /// Returns as soon as the `pending` job is stored. Nothing is stored when
    /// validation fails.
    pub async fn submit(&self, request: ResearchRequest) -> Result<JobId> {
        let query = validate_query(&request.query)?;
        if request.components.is_empty() {
            return Err(AppError::InvalidRequest(
                "At least one retrieval component must be requested".to_string(),
            ));
        }
        if let Some(unbound) = request
            .components
            .iter()
            .find(|c| !self.inner.agents.contains_key(*c))
        {
            return Err(AppError::InvalidRequest(format!(
                "Retrieval component '{}' is not configured",
                unbound
            )));
        }
        request.filters.validate()?;

        let advisories = self.inner.advisor.advise(&query);
        let job = ResearchJob::new(
            JobId::generate(),
            query,
            request.filters,
            request.components,
            request.options,
            advisories,
        )?;
        let id = job.id().clone();

        self.inner.store.create(job.clone()).await?;
        self.publish(JobEvent::new(JobEventKind::Created, &job));

        tracing::info!(
            job_id = %id,
            components = ?job.requested_components(),
            advisories = job.advisories().len(),
            "Research job submitted"
        );

        self.spawn_execution(id.clone());
        Ok(id)
    }

    pub async fn get_status(&self, id: &JobId) -> Result<ResearchJob> {
        self.inner.store.get(id).await
    }

    /// All jobs, most recent first.
    pub async fn list_jobs(&self) -> Result<Vec<ResearchJob>> {
        self.inner.store.list().await
    }

    /// Remove a finished job. Jobs still in flight cannot be deleted.
    pub async fn delete_job(&self, id: &JobId) -> Result<()> {
        let job = self.inner.store.get(id).await?;
        if !job.is_terminal() {
            return Err(AppError::Conflict(format!(
                "job {} is {} and cannot be deleted until it finishes",
                id,
                job.state()
            )));
        }
        self.inner.store.remove(id).await?;
        tracing::info!(job_id = %id, "Research job deleted");
        Ok(())
    }

    /// Stream of job changes. Slow receivers lose events instead of blocking
    /// job execution.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until the job reaches `completed` or `failed`.
    pub async fn wait_for_terminal(&self, id: &JobId, limit: Duration) -> Result<ResearchJob> {
        let deadline = tokio::time::Instant::now() + limit;
        let mut events = self.subscribe();

        loop {
            let job = self.get_status(id).await?;
            if job.is_terminal() {
                return Ok(job);
            }

            loop {
                match tokio::time::timeout_at(deadline, events.recv()).await {
                    Err(_) => {
                        return Err(AppError::Internal(format!(
                            "job {} did not finish within {:?}",
                            id, limit
                        )))
                    }
                    Ok(Ok(event)) if event.job_id == *id => break,
                    Ok(Ok(_)) => continue,
                    Ok(Err(RecvError::Lagged(_))) => break,
                    Ok(Err(RecvError::Closed)) => {
                        return Err(AppError::Internal("job event stream closed".to_string()))
                    }
                }
            }
        }
    }

    /// Pick up jobs a previous process left unfinished.
    ///
    /// `pending` and `retrieving` jobs are re-driven, running only the
    /// components that have no recorded outcome. `synthesizing` jobs are
    /// failed, since their synthesis call may already have been made. Call
    /// once at startup, before accepting submissions. Returns the number of
    /// jobs touched.
    pub async fn resume_incomplete(&self) -> Result<usize> {
        let mut touched = 0;

        for job in self.inner.store.list().await? {
            let id = job.id().clone();
            match job.state() {
                JobState::Pending | JobState::Retrieving => {
                    tracing::info!(
                        job_id = %id,
                        state = %job.state(),
                        pending = ?job.pending_components(),
                        "Resuming research job"
                    );
                    self.spawn_execution(id);
                    touched += 1;
                }
                JobState::Synthesizing => {
                    self.apply(
                        &id,
                        mutator(|job| {
                            let errors = job.component_errors().to_vec();
                            job.fail(JobError::synthesis(
                                "synthesis was interrupted by a restart",
                                errors,
                            ))
                        }),
                    )
                    .await?;
                    tracing::warn!(job_id = %id, "Interrupted synthesis marked as failed");
                    touched += 1;
                }
                JobState::Completed | JobState::Failed => {}
            }
        }

        Ok(touched)
    }

    /// Remove terminal jobs that finished more than `max_age` ago.
    pub async fn prune_expired(&self, max_age: Duration) -> Result<Vec<JobId>> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| AppError::Configuration(format!("Invalid retention age: {}", e)))?;
        let cutoff = chrono::Utc::now() - max_age;

        let mut removed = Vec::new();
        for job in self.inner.store.list().await? {
            let expired = job
                .completed_at()
                .map(|done| job.is_terminal() && done < cutoff)
                .unwrap_or(false);
            if !expired {
                continue;
            }
            match self.inner.store.remove(job.id()).await {
                Ok(()) => removed.push(job.id().clone()),
                Err(AppError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if !removed.is_empty() {
            tracing::info!(removed = removed.len(), "Pruned expired research jobs");
        }
        Ok(removed)
    }

    // ============= Execution =============

    fn publish(&self, event: JobEvent) {
        // No receivers is not an error.
        let _ = self.inner.events.send(event);
    }

    fn retrieval_timeout(&self, component: RetrievalComponent) -> Duration {
        self.inner
            .retrieval_timeouts
            .get(&component)
            .copied()
            .unwrap_or(self.inner.default_retrieval_timeout)
    }

    /// Apply a state transition and announce it.
    async fn apply(&self, id: &JobId, change: JobMutator) -> Result<ResearchJob> {
        let job = self.inner.store.update(id, change).await?;
        self.publish(JobEvent::new(JobEventKind::Transitioned, &job));
        tracing::debug!(job_id = %id, state = %job.state(), "Job transitioned");
        Ok(job)
    }

    fn spawn_execution(&self, id: JobId) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.execute(id).await;
        });
    }

    async fn execute(self, id: JobId) {
        let started = Instant::now();
        match self.drive(&id).await {
            Ok(Some(job)) => tracing::info!(
                job_id = %id,
                state = %job.state(),
                elapsed_ms = elapsed_ms(started),
                "Research job finished"
            ),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Research job execution failed");
                self.fail_internal(&id, e).await;
            }
        }
    }

    /// Run the job to a terminal state. Returns `None` when there was nothing
    /// to do.
    async fn drive(&self, id: &JobId) -> Result<Option<ResearchJob>> {
        let mut job = self.inner.store.get(id).await?;

        match job.state() {
            JobState::Pending => {
                job = self.apply(id, mutator(|job| job.begin_retrieval())).await?;
            }
            JobState::Retrieving => {}
            JobState::Synthesizing | JobState::Completed | JobState::Failed => return Ok(None),
        }

        let job = self.retrieve(job).await?;

        if job.succeeded_components().is_empty() {
            let errors = job.component_errors().to_vec();
            let job = self
                .apply(
                    id,
                    mutator(move |job| job.fail(JobError::all_components_failed(errors))),
                )
                .await?;
            tracing::warn!(
                job_id = %id,
                state = %job.state(),
                "Every retrieval component failed; synthesis skipped"
            );
            return Ok(Some(job));
        }

        let job = self.apply(id, mutator(|job| job.begin_synthesis())).await?;
        self.synthesize(job).await.map(Some)
    }

    /// Run every component without an outcome and record results as they
    /// arrive. Returns the job once all outcomes are in.
    async fn retrieve(&self, job: ResearchJob) -> Result<ResearchJob> {
        let id = job.id().clone();
        let mut tasks = JoinSet::new();

        for component in job.pending_components() {
            let agent = match self.inner.agents.get(&component) {
                Some(agent) => Arc::clone(agent),
                None => {
                    let error = ComponentError::failed(component, "no agent is configured");
                    self.record(&id, component, Err(error), 0).await?;
                    continue;
                }
            };
            let query = job.query().to_string();
            let filters = *job.filters();
            let limit = self.retrieval_timeout(component);

            tasks.spawn(async move {
                let started = Instant::now();
                let outcome = AssertUnwindSafe(timeout(limit, agent.search(&query, &filters)))
                    .catch_unwind()
                    .await;

                let outcome = match outcome {
                    Ok(Ok(Ok(hits))) if hits.component() == component => Ok(hits),
                    Ok(Ok(Ok(hits))) => Err(ComponentError::failed(
                        component,
                        format!("agent returned {} results", hits.component()),
                    )),
                    Ok(Ok(Err(e))) => Err(ComponentError::failed(component, e.to_string())),
                    Ok(Err(_)) => Err(ComponentError::timed_out(
                        component,
                        format!("no response within {:?}", limit),
                    )),
                    Err(payload) => Err(ComponentError::failed(
                        component,
                        format!("retrieval panicked: {}", panic_message(payload.as_ref())),
                    )),
                };
                (component, outcome, elapsed_ms(started))
            });
        }

        // A failed write must not abort the siblings still running.
        let mut unrecorded: HashMap<RetrievalComponent, String> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((component, outcome, elapsed)) => {
                    if let Err(e) = self.record(&id, component, outcome, elapsed).await {
                        tracing::error!(
                            job_id = %id,
                            component = %component,
                            error = %e,
                            "Could not record retrieval outcome"
                        );
                        unrecorded.insert(component, e.to_string());
                    }
                }
                Err(e) => {
                    tracing::error!(job_id = %id, error = %e, "Retrieval task aborted");
                }
            }
        }

        // Aborted tasks and lost writes leave a component without an outcome.
        let job = self.inner.store.get(&id).await?;
        for component in job.pending_components() {
            let message = match unrecorded.remove(&component) {
                Some(cause) => format!("result could not be stored: {}", cause),
                None => "retrieval task ended without a result".to_string(),
            };
            let error = ComponentError::failed(component, message);
            self.record(&id, component, Err(error), 0).await?;
        }

        self.inner.store.get(&id).await
    }

    async fn record(
        &self,
        id: &JobId,
        component: RetrievalComponent,
        outcome: std::result::Result<RetrievalHits, ComponentError>,
        elapsed: u64,
    ) -> Result<()> {
        let job = match outcome {
            Ok(hits) => {
                tracing::info!(
                    job_id = %id,
                    component = %component,
                    hits = hits.len(),
                    elapsed_ms = elapsed,
                    "Retrieval component finished"
                );
                self.inner
                    .store
                    .update(id, mutator(move |job| job.record_hits(hits)))
                    .await?
            }
            Err(error) => {
                tracing::warn!(
                    job_id = %id,
                    component = %component,
                    error = %error.describe(),
                    elapsed_ms = elapsed,
                    "Retrieval component failed"
                );
                self.inner
                    .store
                    .update(id, mutator(move |job| job.record_component_error(error)))
                    .await?
            }
        };

        self.publish(JobEvent::new(JobEventKind::ComponentFinished, &job).with_component(component));
        Ok(())
    }

    async fn synthesize(&self, job: ResearchJob) -> Result<ResearchJob> {
        let id = job.id().clone();
        let notes = coverage_notes(
            job.requested_components(),
            job.case_law_result(),
            job.web_result(),
            job.component_errors(),
        );
        let request = SynthesisRequest {
            query: job.query(),
            case_law: job.case_law_result(),
            web: job.web_result(),
            options: *job.options(),
            coverage_notes: &notes,
        };

        let limit = self.inner.synthesis_timeout;
        let started = Instant::now();
        let outcome = AssertUnwindSafe(timeout(limit, self.inner.synthesizer.synthesize(request)))
            .catch_unwind()
            .await;

        let outcome = match outcome {
            Ok(Ok(Ok(mut report))) => {
                report.coverage_notes = notes.clone();
                Ok(report)
            }
            Ok(Ok(Err(e))) => Err(e.to_string()),
            Ok(Err(_)) => Err(format!("synthesis timed out after {:?}", limit)),
            Err(payload) => Err(format!(
                "synthesis panicked: {}",
                panic_message(payload.as_ref())
            )),
        };

        match outcome {
            Ok(report) => {
                tracing::info!(
                    job_id = %id,
                    synthesizer = self.inner.synthesizer.name(),
                    sections = report.sections.len(),
                    citations = report.citations.len(),
                    elapsed_ms = elapsed_ms(started),
                    "Synthesis finished"
                );
                self.apply(&id, mutator(move |job| job.complete(report)))
                    .await
            }
            Err(message) => {
                tracing::error!(
                    job_id = %id,
                    error = %message,
                    elapsed_ms = elapsed_ms(started),
                    "Synthesis failed"
                );
                let errors = job.component_errors().to_vec();
                self.apply(
                    &id,
                    mutator(move |job| job.fail(JobError::synthesis(message, errors))),
                )
                .await
            }
        }
    }

    /// Record an unexpected execution error on the job, walking only legal
    /// edges so the job always ends terminal. The write is retried with
    /// backoff.
    async fn fail_internal(&self, id: &JobId, cause: AppError) {
        let message = cause.to_string();
        let mut delay = FAIL_RETRY_BASE_DELAY;

        for attempt in 1..=FAIL_RETRY_ATTEMPTS {
            match self.apply(id, fail_mutator(message.clone())).await {
                Ok(job) => {
                    tracing::warn!(
                        job_id = %id,
                        state = %job.state(),
                        attempt,
                        "Recorded job failure"
                    );
                    return;
                }
                Err(AppError::NotFound(_)) => return,
                Err(e) => {
                    tracing::error!(
                        job_id = %id,
                        error = %e,
                        attempt,
                        "Could not record job failure"
                    );
                }
            }
            if attempt < FAIL_RETRY_ATTEMPTS {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}

const FAIL_RETRY_ATTEMPTS: u32 = 5;
const FAIL_RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Drive a job from any non-terminal state to `failed`.
///
/// Components still without an outcome are recorded as failed. A job with no
/// successful component fails as `AllComponentsFailed`; otherwise it passes
/// through `synthesizing` and fails as `Internal`.
fn fail_mutator(message: String) -> JobMutator {
    mutator(move |job| {
        if job.state().is_terminal() {
            return Ok(());
        }
        if job.state() == JobState::Pending {
            job.begin_retrieval()?;
        }
        if job.state() == JobState::Retrieving {
            for component in job.pending_components() {
                job.record_component_error(ComponentError::failed(
                    component,
                    format!("interrupted: {}", message),
                ))?;
            }
            if job.succeeded_components().is_empty() {
                let errors = job.component_errors().to_vec();
                return job.fail(JobError::all_components_failed(errors));
            }
            job.begin_synthesis()?;
        }
        let errors = job.component_errors().to_vec();
        job.fail(JobError::internal(message, errors))
    })
}
