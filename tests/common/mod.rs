//! Shared fixtures for integration tests.
#![allow(dead_code)]

pub mod mocks;

use juris::retrieval::{CaseCitation, CaseExcerpt, RetrievalAgent, WebDocument};
use juris::research::SynthesisAgent;
use juris::{InMemoryJobStore, JobStore, Orchestrator};
use mocks::{CountingSynthesizer, StubAgent};
use std::sync::Arc;
use std::time::Duration;

pub const RETRIEVAL_TIMEOUT: Duration = Duration::from_millis(300);
pub const SYNTHESIS_TIMEOUT: Duration = Duration::from_millis(500);
pub const WAIT: Duration = Duration::from_secs(10);

pub fn case_excerpts(n: usize) -> Vec<CaseExcerpt> {
    (0..n)
        .map(|i| CaseExcerpt {
            excerpt: format!(
                "The landlord's failure to repair the premises justified withholding rent ({}).",
                i
            ),
            citation: CaseCitation {
                case_name: Some(format!("Tenant v. Landlord {}", i)),
                citation: Some(format!("{} Mass. {}", 400 + i, 10 + i)),
                year: Some(2000 + i as i32),
                source: Some("Massachusetts SJC".to_string()),
            },
            score: 0.9 - i as f32 * 0.01,
        })
        .collect()
}

pub fn web_documents(n: usize) -> Vec<WebDocument> {
    (0..n)
        .map(|i| WebDocument {
            title: format!("Tenant rights update {}", i),
            url: format!("https://www.mass.gov/tenant-rights/{}", i),
            snippet: "Recent changes to security deposit rules.".to_string(),
            score: 0.8 - i as f32 * 0.01,
            published_date: None,
        })
        .collect()
}

/// Orchestrator over an in-memory store with short test timeouts.
pub fn orchestrator(
    agents: Vec<Arc<StubAgent>>,
    synthesizer: Arc<CountingSynthesizer>,
) -> Orchestrator {
    orchestrator_with_store(agents, synthesizer, Arc::new(InMemoryJobStore::new()))
}

pub fn orchestrator_with_store(
    agents: Vec<Arc<StubAgent>>,
    synthesizer: Arc<CountingSynthesizer>,
    store: Arc<dyn JobStore>,
) -> Orchestrator {
    let mut builder = Orchestrator::builder()
        .store(store)
        .synthesizer(synthesizer as Arc<dyn SynthesisAgent>)
        .default_retrieval_timeout(RETRIEVAL_TIMEOUT)
        .synthesis_timeout(SYNTHESIS_TIMEOUT);
    for agent in agents {
        builder = builder.agent(agent as Arc<dyn RetrievalAgent>);
    }
    builder.build().expect("orchestrator should build")
}
