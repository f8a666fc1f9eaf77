//! Case-law retrieval over a semantic index.

use super::{
    sort_by_score, CaseCitation, CaseExcerpt, RetrievalAgent, RetrievalComponent, RetrievalHits,
    SearchFilters,
};
use crate::llm::Embedder;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// One vector-index match with its case metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub citation: CaseCitation,
}

/// Vector index holding embedded case excerpts.
#[async_trait]
pub trait CaseIndex: Send + Sync {
    /// Return up to `top_k` matches for `vector`, restricted to `filters`.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<IndexMatch>>;

    /// Backend name for logs and health output
    fn name(&self) -> &str;
}

pub const DEFAULT_TOP_K: usize = 15;

/// Retrieval agent for the `case_law` component.
pub struct CaseLawAgent {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn CaseIndex>,
    top_k: usize,
}

impl CaseLawAgent {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn CaseIndex>) -> Self {
        Self {
            embedder,
            index,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }
}

#[async_trait]
impl RetrievalAgent for CaseLawAgent {
    fn component(&self) -> RetrievalComponent {
        RetrievalComponent::CaseLaw
    }

    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<RetrievalHits> {
        let start = Instant::now();
        let component = RetrievalComponent::CaseLaw;

        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| AppError::retrieval(component, format!("embedding failed: {}", e)))?;

        let matches = self
            .index
            .query(&vector, self.top_k, filters)
            .await
            .map_err(|e| match e {
                AppError::Retrieval { .. } => e,
                other => AppError::retrieval(component, other.to_string()),
            })?;

        let mut excerpts: Vec<CaseExcerpt> = matches
            .into_iter()
            .filter(|m| !m.text.trim().is_empty())
            .filter(|m| filters.matches_year(m.citation.year))
            .map(|m| CaseExcerpt {
                excerpt: m.text,
                citation: m.citation,
                score: m.score,
            })
            .collect();
        sort_by_score(&mut excerpts, |e| e.score);
        excerpts.truncate(self.top_k);

        tracing::debug!(
            index = self.index.name(),
            hits = excerpts.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Case-law search finished"
        );

        Ok(RetrievalHits::CaseLaw(excerpts))
    }
}

// ============= In-memory index =============

/// A case excerpt as stored in a seed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedCase {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub case_name: Option<String>,
    #[serde(default)]
    pub citation: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub source: Option<String>,
    /// Precomputed embedding; computed at load time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl IndexedCase {
    fn citation(&self) -> CaseCitation {
        CaseCitation {
            case_name: self.case_name.clone(),
            citation: self.citation.clone(),
            year: self.year,
            source: self.source.clone(),
        }
    }
}

/// Brute-force cosine-similarity index for local corpora and tests.
pub struct InMemoryCaseIndex {
    entries: Vec<(IndexedCase, Vec<f32>)>,
}

impl InMemoryCaseIndex {
    /// Build from cases whose embeddings are all present.
    pub fn new(cases: Vec<IndexedCase>) -> Result<Self> {
        let mut entries = Vec::with_capacity(cases.len());
        for mut case in cases {
            let vector = case.embedding.take().ok_or_else(|| {
                AppError::InvalidRequest(format!("Case '{}' has no embedding", case.id))
            })?;
            entries.push((case, vector));
        }
        Ok(Self { entries })
    }

    /// Build from cases, embedding any that lack a vector.
    pub async fn with_embedder(cases: Vec<IndexedCase>, embedder: &dyn Embedder) -> Result<Self> {
        let missing: Vec<String> = cases
            .iter()
            .filter(|c| c.embedding.is_none())
            .map(|c| c.text.clone())
            .collect();
        let mut computed = embedder.embed_batch(&missing).await?.into_iter();

        let mut entries = Vec::with_capacity(cases.len());
        for mut case in cases {
            let vector = match case.embedding.take() {
                Some(vector) => vector,
                None => computed.next().ok_or_else(|| {
                    AppError::Internal("Embedder returned fewer vectors than requested".into())
                })?,
            };
            entries.push((case, vector));
        }
        Ok(Self { entries })
    }

    /// Load a JSON array of [`IndexedCase`] records.
    pub async fn load<P: AsRef<Path>>(path: P, embedder: &dyn Embedder) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Configuration(format!("Failed to read case seed {}: {}", path.display(), e))
        })?;
        let cases: Vec<IndexedCase> = serde_json::from_str(&content).map_err(|e| {
            AppError::Configuration(format!("Invalid case seed {}: {}", path.display(), e))
        })?;
        tracing::info!(path = %path.display(), cases = cases.len(), "Loading case-law seed");
        Self::with_embedder(cases, embedder).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CaseIndex for InMemoryCaseIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<IndexMatch>> {
        let mut matches: Vec<IndexMatch> = self
            .entries
            .iter()
            .filter(|(case, _)| filters.matches_year(case.year))
            .map(|(case, stored)| IndexMatch {
                id: case.id.clone(),
                score: cosine_similarity(vector, stored),
                text: case.text.clone(),
                citation: case.citation(),
            })
            .collect();
        sort_by_score(&mut matches, |m| m.score);
        matches.truncate(top_k);
        Ok(matches)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
