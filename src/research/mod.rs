//! Legal research orchestration
//!
//! A research job gathers evidence from the retrieval agents concurrently and
//! then asks a synthesis agent for a formal report.
//!
//! # Architecture
//!
//! - [`orchestrator::Orchestrator`] - Drives jobs through their state machine
//! - [`synthesis::SynthesisAgent`] - Turns evidence into a [`report::ResearchReport`]
//! - [`query`] - Query validation and non-blocking advisories
//! - [`retention`] - Background eviction of finished jobs
//!
//! # Usage
//!
//! ```ignore
//! use juris::research::{Orchestrator, ResearchRequest};
//!
//! let orchestrator = Orchestrator::builder()
//!     .store(store)
//!     .agent(case_law_agent)
//!     .agent(web_agent)
//!     .synthesizer(synthesizer)
//!     .build()?;
//!
//! let job_id = orchestrator
//!     .submit(ResearchRequest::new("Massachusetts rental disputes"))
//!     .await?;
//! let job = orchestrator.wait_for_terminal(&job_id, Duration::from_secs(600)).await?;
//! ```

pub mod orchestrator;
pub mod query;
pub mod report;
pub mod retention;
pub mod synthesis;

pub use orchestrator::{Orchestrator, OrchestratorBuilder, ResearchRequest};
pub use query::{validate_query, QueryAdvisor};
pub use report::{
    Citation, CoverageNote, ReportFormat, ReportLength, ReportOptions, ReportSection,
    ResearchReport, SourceEntry,
};
pub use retention::spawn_sweeper;
pub use synthesis::{LlmSynthesizer, SynthesisAgent, SynthesisRequest};
