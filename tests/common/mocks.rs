//! Mock implementations for testing.
//!
//! Retrieval agents, synthesizers and LLM clients with scripted behaviour, so
//! orchestrator and API tests run without any network dependencies.

use async_trait::async_trait;
use juris::jobs::JobMutator;
use juris::llm::LLMClient;
use juris::research::report::build_citations;
use juris::research::{CoverageNote, ReportSection, ResearchReport, SynthesisAgent, SynthesisRequest};
use juris::retrieval::{RetrievalAgent, RetrievalComponent, RetrievalHits, SearchFilters};
use juris::types::{AppError, Result};
use juris::{InMemoryJobStore, JobId, JobStore, ResearchJob};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What a [`StubAgent`] does when searched.
#[derive(Clone)]
pub enum AgentBehavior {
    /// Return these hits
    Succeed(RetrievalHits),
    /// Return these hits after a delay
    Delay(Duration, RetrievalHits),
    /// Return a retrieval error
    Fail(String),
    /// Never return
    Hang,
    /// Panic inside the search call
    Panic(String),
    /// Return hits tagged with the wrong component
    WrongComponent,
}

/// Retrieval agent with scripted behaviour and a call counter.
pub struct StubAgent {
    component: RetrievalComponent,
    behavior: AgentBehavior,
    calls: AtomicUsize,
    last_filters: Mutex<Option<SearchFilters>>,
}

impl StubAgent {
    pub fn new(component: RetrievalComponent, behavior: AgentBehavior) -> Self {
        Self {
            component,
            behavior,
            calls: AtomicUsize::new(0),
            last_filters: Mutex::new(None),
        }
    }

    /// Case-law agent returning `n` excerpts.
    pub fn case_law(n: usize) -> Self {
        Self::new(
            RetrievalComponent::CaseLaw,
            AgentBehavior::Succeed(RetrievalHits::CaseLaw(super::case_excerpts(n))),
        )
    }

    /// Web agent returning `n` documents.
    pub fn web(n: usize) -> Self {
        Self::new(
            RetrievalComponent::Web,
            AgentBehavior::Succeed(RetrievalHits::Web(super::web_documents(n))),
        )
    }

    pub fn failing(component: RetrievalComponent, message: &str) -> Self {
        Self::new(component, AgentBehavior::Fail(message.to_string()))
    }

    pub fn hanging(component: RetrievalComponent) -> Self {
        Self::new(component, AgentBehavior::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_filters(&self) -> Option<SearchFilters> {
        *self.last_filters.lock()
    }
}

#[async_trait]
impl RetrievalAgent for StubAgent {
    fn component(&self) -> RetrievalComponent {
        self.component
    }

    async fn search(&self, _query: &str, filters: &SearchFilters) -> Result<RetrievalHits> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_filters.lock() = Some(*filters);

        match &self.behavior {
            AgentBehavior::Succeed(hits) => Ok(hits.clone()),
            AgentBehavior::Delay(delay, hits) => {
                tokio::time::sleep(*delay).await;
                Ok(hits.clone())
            }
            AgentBehavior::Fail(message) => Err(AppError::retrieval(self.component, message.clone())),
            AgentBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            AgentBehavior::Panic(message) => panic!("{}", message),
            AgentBehavior::WrongComponent => Ok(match self.component {
                RetrievalComponent::CaseLaw => RetrievalHits::Web(super::web_documents(1)),
                RetrievalComponent::Web => RetrievalHits::CaseLaw(super::case_excerpts(1)),
            }),
        }
    }
}

/// What a [`CountingSynthesizer`] does when called.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SynthesisBehavior {
    Succeed,
    Fail,
    Hang,
}

/// Owned copy of the last synthesis request.
#[derive(Debug, Clone, Default)]
pub struct SeenRequest {
    pub query: String,
    pub case_law: Option<usize>,
    pub web: Option<usize>,
    pub coverage_notes: Vec<CoverageNote>,
}

/// Synthesis agent that counts calls and builds a report straight from
/// the evidence it is given.
pub struct CountingSynthesizer {
    behavior: SynthesisBehavior,
    calls: AtomicUsize,
    seen: Mutex<Option<SeenRequest>>,
}

impl CountingSynthesizer {
    pub fn new(behavior: SynthesisBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(None),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(SynthesisBehavior::Succeed)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<SeenRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl SynthesisAgent for CountingSynthesizer {
    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<ResearchReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock() = Some(SeenRequest {
            query: request.query.to_string(),
            case_law: request.case_law.map(|r| r.len()),
            web: request.web.map(|r| r.len()),
            coverage_notes: request.coverage_notes.to_vec(),
        });

        match self.behavior {
            SynthesisBehavior::Succeed => {}
            SynthesisBehavior::Fail => {
                return Err(AppError::Synthesis("model refused to answer".to_string()))
            }
            SynthesisBehavior::Hang => {
                std::future::pending::<()>().await;
            }
        }

        let case_law = request.case_law.unwrap_or_default();
        let web = request.web.unwrap_or_default();
        Ok(ResearchReport {
            title: format!("Legal Research Report: {}", request.query),
            query: request.query.to_string(),
            options: request.options,
            sections: vec![
                ReportSection {
                    heading: "Executive Summary".to_string(),
                    body: format!(
                        "Reviewed {} cases and {} web sources.",
                        case_law.len(),
                        web.len()
                    ),
                },
                ReportSection {
                    heading: "Conclusion".to_string(),
                    body: "Further review recommended.".to_string(),
                },
            ],
            citations: build_citations(case_law, web),
            sources: vec![],
            // The orchestrator owns coverage notes; leave them empty here.
            coverage_notes: vec![],
            model: Some("counting-synthesizer".to_string()),
            generated_at: chrono::Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Mock LLM client with a fixed response and a prompt log.
pub struct MockLLMClient {
    response: String,
    should_fail: bool,
    prompts: Mutex<Vec<(String, String)>>,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            should_fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            response: String::new(),
            should_fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// `(system, user)` prompt pairs received so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .push((system.to_string(), prompt.to_string()));
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Job store that fails chosen `update` calls (1-based) with a database error
/// and passes everything else to an in-memory store.
pub struct FlakyStore {
    inner: InMemoryJobStore,
    failing_updates: HashSet<usize>,
    updates: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_updates(updates: impl IntoIterator<Item = usize>) -> Self {
        Self {
            inner: InMemoryJobStore::new(),
            failing_updates: updates.into_iter().collect(),
            updates: AtomicUsize::new(0),
        }
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn create(&self, job: ResearchJob) -> Result<()> {
        self.inner.create(job).await
    }

    async fn get(&self, id: &JobId) -> Result<ResearchJob> {
        self.inner.get(id).await
    }

    async fn update(&self, id: &JobId, mutator: JobMutator) -> Result<ResearchJob> {
        let call = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_updates.contains(&call) {
            return Err(AppError::Database(format!("connection reset on update {}", call)));
        }
        self.inner.update(id, mutator).await
    }

    async fn list(&self) -> Result<Vec<ResearchJob>> {
        self.inner.list().await
    }

    async fn remove(&self, id: &JobId) -> Result<()> {
        self.inner.remove(id).await
    }
}
