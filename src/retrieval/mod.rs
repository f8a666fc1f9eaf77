//! Retrieval agents
//!
//! A retrieval agent turns a research query into ranked evidence. Two kinds
//! exist, each bound to exactly one [`RetrievalComponent`]:
//!
//! - [`case_law::CaseLawAgent`] embeds the query and searches a semantic index
//!   of historical case excerpts, honouring an optional year range.
//! - [`web::WebSearchAgent`] frames the query for legal sources and asks a live
//!   web search provider for documents.
//!
//! Agents are stateless per call; the orchestrator owns timeouts and failure
//! handling.

pub mod case_law;
pub mod pinecone;
pub mod web;

pub use case_law::{CaseIndex, CaseLawAgent, InMemoryCaseIndex, IndexMatch};
pub use pinecone::PineconeIndex;
pub use web::{DuckDuckGoSearch, TavilySearch, WebSearchAgent, WebSearchProvider};

use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// A retrieval source a job can request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalComponent {
    /// Semantic search over the historical case-law corpus
    CaseLaw,
    /// Live web search
    Web,
}

impl RetrievalComponent {
    pub const ALL: [RetrievalComponent; 2] = [RetrievalComponent::CaseLaw, RetrievalComponent::Web];

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalComponent::CaseLaw => "case_law",
            RetrievalComponent::Web => "web",
        }
    }

    /// Human-readable label used in reports and CLI output
    pub fn label(&self) -> &'static str {
        match self {
            RetrievalComponent::CaseLaw => "Case law",
            RetrievalComponent::Web => "Web search",
        }
    }
}

impl fmt::Display for RetrievalComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalComponent {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "case_law" | "caselaw" | "legal_rag" => Ok(RetrievalComponent::CaseLaw),
            "web" | "websearch" | "web_search" => Ok(RetrievalComponent::Web),
            other => Err(AppError::InvalidRequest(format!(
                "Unknown retrieval component '{}'",
                other
            ))),
        }
    }
}

/// Structured constraints applied to retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_start: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_end: Option<i32>,
}

impl SearchFilters {
    pub fn new(year_start: Option<i32>, year_end: Option<i32>) -> Self {
        Self {
            year_start,
            year_end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.year_start.is_none() && self.year_end.is_none()
    }

    /// Reject inverted year ranges.
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.year_start, self.year_end) {
            if start > end {
                return Err(AppError::InvalidRequest(format!(
                    "year_start ({}) must not be after year_end ({})",
                    start, end
                )));
            }
        }
        Ok(())
    }

    /// Whether a case decided in `year` falls inside the range.
    /// Cases without a known year only match an unfiltered search.
    pub fn matches_year(&self, year: Option<i32>) -> bool {
        if self.is_empty() {
            return true;
        }
        match year {
            Some(year) => {
                self.year_start.map_or(true, |start| year >= start)
                    && self.year_end.map_or(true, |end| year <= end)
            }
            None => false,
        }
    }
}

/// Citation metadata attached to a case excerpt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CaseCitation {
    pub case_name: Option<String>,
    pub citation: Option<String>,
    pub year: Option<i32>,
    pub source: Option<String>,
}

impl CaseCitation {
    /// Render as `Case, Citation (Year)`, dropping whatever parts are unknown.
    pub fn formatted(&self) -> String {
        let case_name = self
            .case_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Unknown case");

        let mut rendered = case_name.to_string();
        if let Some(citation) = self.citation.as_deref().filter(|c| !c.trim().is_empty()) {
            rendered.push_str(", ");
            rendered.push_str(citation);
        }
        if let Some(year) = self.year {
            rendered.push_str(&format!(" ({})", year));
        }
        rendered
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CaseExcerpt {
    pub excerpt: String,
    pub citation: CaseCitation,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WebDocument {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

/// Output of one retrieval call, tagged by the component that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "component", content = "hits", rename_all = "snake_case")]
pub enum RetrievalHits {
    CaseLaw(Vec<CaseExcerpt>),
    Web(Vec<WebDocument>),
}

impl RetrievalHits {
    pub fn component(&self) -> RetrievalComponent {
        match self {
            RetrievalHits::CaseLaw(_) => RetrievalComponent::CaseLaw,
            RetrievalHits::Web(_) => RetrievalComponent::Web,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RetrievalHits::CaseLaw(hits) => hits.len(),
            RetrievalHits::Web(hits) => hits.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A retrieval capability bound to one component.
#[async_trait]
pub trait RetrievalAgent: Send + Sync {
    /// Which component this agent serves
    fn component(&self) -> RetrievalComponent;

    /// Search for evidence relevant to `query`.
    ///
    /// Failures are reported as [`AppError::Retrieval`].
    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<RetrievalHits>;
}

/// Sort by descending score; NaN scores sink to the end.
pub(crate) fn sort_by_score<T>(items: &mut [T], score: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| {
        let (a, b) = (score(a), score(b));
        match (a.is_nan(), b.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => b.total_cmp(&a),
        }
    });
}
