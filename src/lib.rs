//! # JURIS - Legal Research Job Orchestrator
//!
//! JURIS answers legal research questions as background jobs. Each job runs
//! semantic search over a case-law corpus and a live web search concurrently,
//! then asks an LLM to synthesize a formal research memorandum with
//! deterministic citations.
//!
//! ## Overview
//!
//! JURIS can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `juris-server` binary
//! 2. **As a library** - Embed the [`Orchestrator`] in your own Rust project
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use juris::{InMemoryJobStore, LlmSynthesizer, Orchestrator, Provider, ResearchRequest};
//! use std::{sync::Arc, time::Duration};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let llm = Provider::Ollama {
//!         base_url: "http://localhost:11434".to_string(),
//!         model: "llama3.1".to_string(),
//!     }
//!     .create_client()
//!     .await?;
//!
//!     let orchestrator = Orchestrator::builder()
//!         .store(Arc::new(InMemoryJobStore::new()))
//!         .agent(web_agent)
//!         .synthesizer(Arc::new(LlmSynthesizer::new(Arc::from(llm))))
//!         .build()?;
//!
//!     let id = orchestrator
//!         .submit(ResearchRequest::new("Massachusetts security deposit interest"))
//!         .await?;
//!     let job = orchestrator.wait_for_terminal(&id, Duration::from_secs(600)).await?;
//!     if let Some(report) = job.report() {
//!         println!("{}", report.to_markdown());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API completions and embeddings (default) |
//!
//! ## Modules
//!
//! - [`research`] - Orchestrator, synthesis and report model
//! - [`jobs`] - Job record, state machine and [`JobStore`]
//! - [`retrieval`] - Case-law and web retrieval agents
//! - [`llm`] - LLM and embedding clients
//! - [`db`] - Durable job storage (libsql / Turso)
//! - [`api`] - REST API handlers and routes
//! - [`types`] - Wire types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Durable job stores (libsql / Turso).
pub mod db;
/// Research job record, state machine and storage trait.
pub mod jobs;
/// LLM provider clients and abstractions.
pub mod llm;
/// Orchestration, synthesis and reports.
pub mod research;
/// Retrieval agents (case law, web search).
pub mod retrieval;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use db::{SqlJobStore, StorageProvider};
pub use jobs::{InMemoryJobStore, JobId, JobState, JobStore, ResearchJob};
pub use llm::{Embedder, LLMClient, Provider};
pub use research::{
    LlmSynthesizer, Orchestrator, OrchestratorBuilder, ResearchReport, ResearchRequest,
    SynthesisAgent,
};
pub use retrieval::{RetrievalAgent, RetrievalComponent, SearchFilters};
pub use types::{AppError, Result};
pub use utils::toml_config::JurisConfig;

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration the server was started with
    pub config: Arc<JurisConfig>,
    /// Job orchestrator
    pub orchestrator: Orchestrator,
}
