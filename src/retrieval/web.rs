//! Live web retrieval
//!
//! [`WebSearchAgent`] frames the research query for legal sources and delegates
//! to a [`WebSearchProvider`]:
//! - [`TavilySearch`]: Tavily search API (advanced depth, domain allow-list)
//! - [`DuckDuckGoSearch`]: DuckDuckGo through the daedra crate, no API key needed

use super::{
    sort_by_score, RetrievalAgent, RetrievalComponent, RetrievalHits, SearchFilters, WebDocument,
};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_RESULTS: usize = 7;
pub const DEFAULT_SNIPPET_CHARS: usize = 300;
pub const DEFAULT_QUERY_TEMPLATE: &str =
    "Massachusetts legal cases {query} recent interpretation court decisions";

pub fn default_include_domains() -> Vec<String> {
    [
        "law.cornell.edu",
        "justia.com",
        "findlaw.com",
        "caselaw.findlaw.com",
        "mass.gov",
        "masslegalservices.org",
        "masslawyersweekly.com",
        "scholar.google.com",
        "courtlistener.com",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

/// What the agent asks a provider for.
#[derive(Debug, Clone)]
pub struct WebSearchRequest {
    pub query: String,
    pub max_results: usize,
    pub include_domains: Vec<String>,
}

#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(&self, request: &WebSearchRequest) -> Result<Vec<WebDocument>>;

    fn name(&self) -> &str;
}

/// Retrieval agent for the `web` component.
pub struct WebSearchAgent {
    provider: Arc<dyn WebSearchProvider>,
    max_results: usize,
    include_domains: Vec<String>,
    query_template: String,
    snippet_chars: usize,
}

impl WebSearchAgent {
    pub fn new(provider: Arc<dyn WebSearchProvider>) -> Self {
        Self {
            provider,
            max_results: DEFAULT_MAX_RESULTS,
            include_domains: default_include_domains(),
            query_template: DEFAULT_QUERY_TEMPLATE.to_string(),
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn with_include_domains(mut self, domains: Vec<String>) -> Self {
        self.include_domains = domains;
        self
    }

    /// `template` must contain `{query}`; otherwise the query is appended.
    pub fn with_query_template(mut self, template: impl Into<String>) -> Self {
        self.query_template = template.into();
        self
    }

    pub fn with_snippet_chars(mut self, chars: usize) -> Self {
        self.snippet_chars = chars;
        self
    }

    pub fn framed_query(&self, query: &str) -> String {
        let query = query.trim();
        if self.query_template.contains("{query}") {
            self.query_template.replace("{query}", query)
        } else {
            format!("{} {}", self.query_template.trim(), query)
        }
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", text[..byte_idx].trim_end()),
        None => text.to_string(),
    }
}

#[async_trait]
impl RetrievalAgent for WebSearchAgent {
    fn component(&self) -> RetrievalComponent {
        RetrievalComponent::Web
    }

    // Year filters only apply to the case-law index.
    async fn search(&self, query: &str, _filters: &SearchFilters) -> Result<RetrievalHits> {
        let start = Instant::now();
        let request = WebSearchRequest {
            query: self.framed_query(query),
            max_results: self.max_results,
            include_domains: self.include_domains.clone(),
        };

        let mut documents = self.provider.search(&request).await.map_err(|e| match e {
            AppError::Retrieval { .. } => e,
            other => AppError::retrieval(RetrievalComponent::Web, other.to_string()),
        })?;

        documents.retain(|d| !d.url.trim().is_empty());
        for doc in documents.iter_mut() {
            doc.snippet = truncate_snippet(&doc.snippet, self.snippet_chars);
        }
        sort_by_score(&mut documents, |d| d.score);
        documents.truncate(self.max_results);

        tracing::debug!(
            provider = self.provider.name(),
            hits = documents.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Web search finished"
        );

        Ok(RetrievalHits::Web(documents))
    }
}

// ============= Tavily =============

pub const TAVILY_API_BASE: &str = "https://api.tavily.com";

pub struct TavilySearch {
    client: Client,
    api_key: String,
    base_url: String,
    search_depth: String,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_domains: &'a [String],
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    published_date: Option<String>,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: TAVILY_API_BASE.to_string(),
            search_depth: "advanced".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }
}

#[async_trait]
impl WebSearchProvider for TavilySearch {
    async fn search(&self, request: &WebSearchRequest) -> Result<Vec<WebDocument>> {
        let component = RetrievalComponent::Web;
        let body = TavilyRequest {
            api_key: &self.api_key,
            query: &request.query,
            search_depth: &self.search_depth,
            max_results: request.max_results,
            include_domains: &request.include_domains,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::retrieval(component, format!("Tavily request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::retrieval(
                component,
                format!("Tavily returned {}: {}", status, text),
            ));
        }

        let parsed: TavilyResponse = response.json().await.map_err(|e| {
            AppError::retrieval(component, format!("Invalid Tavily response: {}", e))
        })?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| WebDocument {
                title: r.title,
                url: r.url,
                snippet: r.content,
                score: r.score,
                published_date: r.published_date,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "tavily"
    }
}

// ============= DuckDuckGo (daedra) =============

/// Keyless web search. DuckDuckGo has no domain allow-list, so
/// `include_domains` is ignored and scores are derived from result rank.
#[derive(Default)]
pub struct DuckDuckGoSearch;

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn rank_score(rank: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    1.0 - (rank as f32 / total as f32)
}

#[async_trait]
impl WebSearchProvider for DuckDuckGoSearch {
    async fn search(&self, request: &WebSearchRequest) -> Result<Vec<WebDocument>> {
        let search_args = daedra::SearchArgs {
            query: request.query.clone(),
            options: Some(daedra::SearchOptions {
                num_results: request.max_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| {
                AppError::retrieval(RetrievalComponent::Web, format!("Search failed: {}", e))
            })?;

        let total = response.data.len();
        Ok(response
            .data
            .iter()
            .enumerate()
            .map(|(rank, r)| WebDocument {
                title: r.title.clone(),
                url: r.url.clone(),
                snippet: r.description.clone(),
                score: rank_score(rank, total),
                published_date: None,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingProvider {
        seen: Mutex<Vec<WebSearchRequest>>,
        documents: Vec<WebDocument>,
    }

    #[async_trait]
    impl WebSearchProvider for RecordingProvider {
        async fn search(&self, request: &WebSearchRequest) -> Result<Vec<WebDocument>> {
            self.seen.lock().push(request.clone());
            Ok(self.documents.clone())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn doc(url: &str, score: f32, snippet: &str) -> WebDocument {
        WebDocument {
            title: format!("Title {}", url),
            url: url.to_string(),
            snippet: snippet.to_string(),
            score,
            published_date: None,
        }
    }

    #[test]
    fn test_framed_query_uses_template() {
        let agent = WebSearchAgent::new(Arc::new(DuckDuckGoSearch::new()));
        assert_eq!(
            agent.framed_query("  rental dispute "),
            "Massachusetts legal cases rental dispute recent interpretation court decisions"
        );

        let agent = agent.with_query_template("site law");
        assert_eq!(agent.framed_query("lease"), "site law lease");
    }

    #[test]
    fn test_truncate_snippet() {
        assert_eq!(truncate_snippet("short", 300), "short");
        assert_eq!(truncate_snippet("abcdef", 3), "abc...");
        // multi-byte characters are never split
        assert_eq!(truncate_snippet("§§§§", 2), "§§...");
    }

    #[test]
    fn test_rank_score() {
        assert_eq!(rank_score(0, 4), 1.0);
        assert_eq!(rank_score(2, 4), 0.5);
        assert_eq!(rank_score(0, 0), 0.0);
    }

    #[tokio::test]
    async fn test_agent_sorts_truncates_and_limits() {
        let long = "x".repeat(400);
        let provider = Arc::new(RecordingProvider {
            seen: Mutex::new(Vec::new()),
            documents: vec![
                doc("https://a.example", 0.2, "a"),
                doc("https://b.example", 0.9, &long),
                doc("", 0.99, "no url"),
                doc("https://c.example", 0.5, "c"),
            ],
        });
        let agent = WebSearchAgent::new(provider.clone()).with_max_results(2);

        let hits = agent
            .search("rent", &SearchFilters::default())
            .await
            .unwrap();
        let RetrievalHits::Web(documents) = hits else {
            panic!("expected web hits");
        };

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].url, "https://b.example");
        assert_eq!(documents[0].snippet.chars().count(), DEFAULT_SNIPPET_CHARS + 3);
        assert_eq!(documents[1].url, "https://c.example");

        let seen = provider.seen.lock();
        assert_eq!(seen[0].max_results, 2);
        assert!(seen[0].include_domains.contains(&"mass.gov".to_string()));
        assert!(seen[0].query.starts_with("Massachusetts legal cases rent"));
    }
}
