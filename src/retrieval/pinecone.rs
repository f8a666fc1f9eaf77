//! Pinecone-backed case index.
//!
//! Talks to a Pinecone index data-plane host over its REST API. Case metadata is
//! expected under the keys `text`, `case_name`, `citation`, `year` and `source`;
//! `year` may be stored as a number or a string.

use super::{CaseCitation, CaseIndex, IndexMatch, RetrievalComponent, SearchFilters};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl PineconeIndex {
    /// `host` is the index host, e.g. `https://cases-abc123.svc.us-east1-gcp.pinecone.io`.
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let mut host = host.into();
        if !host.starts_with("http://") && !host.starts_with("https://") {
            host = format!("https://{}", host);
        }

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            namespace: None,
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Metadata filter restricting `year` to the requested range.
    pub fn year_filter(filters: &SearchFilters) -> Option<Value> {
        let mut range = Map::new();
        if let Some(start) = filters.year_start {
            range.insert("$gte".to_string(), json!(start));
        }
        if let Some(end) = filters.year_end {
            range.insert("$lte".to_string(), json!(end));
        }
        if range.is_empty() {
            None
        } else {
            Some(json!({ "year": Value::Object(range) }))
        }
    }
}

fn metadata_string(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn metadata_year(metadata: &Map<String, Value>) -> Option<i32> {
    match metadata.get("year")? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl From<PineconeMatch> for IndexMatch {
    fn from(m: PineconeMatch) -> Self {
        let metadata = &m.metadata;
        IndexMatch {
            text: metadata_string(metadata, "text").unwrap_or_default(),
            citation: CaseCitation {
                case_name: metadata_string(metadata, "case_name"),
                citation: metadata_string(metadata, "citation"),
                year: metadata_year(metadata),
                source: metadata_string(metadata, "source"),
            },
            score: m.score,
            id: m.id,
        }
    }
}

#[async_trait]
impl CaseIndex for PineconeIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<IndexMatch>> {
        let component = RetrievalComponent::CaseLaw;
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            filter: Self::year_filter(filters),
            namespace: self.namespace.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::retrieval(component, format!("Pinecone request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::retrieval(
                component,
                format!("Pinecone returned {}: {}", status, text),
            ));
        }

        let parsed: QueryResponse = response.json().await.map_err(|e| {
            AppError::retrieval(component, format!("Invalid Pinecone response: {}", e))
        })?;

        Ok(parsed.matches.into_iter().map(IndexMatch::from).collect())
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}
