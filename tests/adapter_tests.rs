//! External adapter tests
//!
//! Run the Tavily, Pinecone and OpenAI adapters against wiremock servers.

use async_trait::async_trait;
use juris::llm::Embedder;
use juris::retrieval::{
    CaseLawAgent, PineconeIndex, RetrievalAgent, RetrievalHits, TavilySearch, WebSearchAgent,
};
use juris::types::{AppError, Result};
use juris::{RetrievalComponent, SearchFilters};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.1, 0.2, 0.3])
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

// ============= Tavily =============

#[tokio::test]
async fn test_tavily_search_frames_query_and_ranks_results() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({
            "api_key": "tvly-test",
            "query": "Massachusetts legal cases rent escrow recent interpretation court decisions",
            "search_depth": "advanced",
            "max_results": 2,
            "include_domains": ["mass.gov"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {
                    "title": "Low ranked",
                    "url": "https://www.mass.gov/low",
                    "content": "low",
                    "score": 0.2
                },
                {
                    "title": "Rent escrow guide",
                    "url": "https://www.mass.gov/rent-escrow",
                    "content": "Tenants may pay rent into escrow when conditions violate the sanitary code.",
                    "score": 0.9,
                    "published_date": "2024-03-01"
                },
                {
                    "title": "No url",
                    "url": "",
                    "content": "dropped",
                    "score": 1.0
                },
                {
                    "title": "Middle",
                    "url": "https://www.mass.gov/middle",
                    "content": "middle",
                    "score": 0.5
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = TavilySearch::new("tvly-test").unwrap().with_base_url(server.uri());
    let agent = WebSearchAgent::new(Arc::new(provider))
        .with_max_results(2)
        .with_include_domains(vec!["mass.gov".to_string()]);

    let hits = agent
        .search("rent escrow", &SearchFilters::default())
        .await
        .unwrap();

    match hits {
        RetrievalHits::Web(docs) => {
            assert_eq!(docs.len(), 2);
            assert_eq!(docs[0].url, "https://www.mass.gov/rent-escrow");
            assert_eq!(docs[0].published_date.as_deref(), Some("2024-03-01"));
            assert_eq!(docs[1].url, "https://www.mass.gov/middle");
        }
        other => panic!("Expected web hits, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tavily_error_status_is_retrieval_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let provider = TavilySearch::new("bad-key").unwrap().with_base_url(server.uri());
    let agent = WebSearchAgent::new(Arc::new(provider));

    match agent.search("rent escrow", &SearchFilters::default()).await {
        Err(AppError::Retrieval { component, message }) => {
            assert_eq!(component, RetrievalComponent::Web);
            assert!(message.contains("401"));
        }
        other => panic!("Expected retrieval error, got {:?}", other),
    }
}

// ============= Pinecone =============

#[tokio::test]
async fn test_pinecone_query_applies_filter_and_parses_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("Api-Key", "pc-test"))
        .and(body_partial_json(json!({
            "vector": [0.1, 0.2, 0.3],
            "topK": 5,
            "includeMetadata": true,
            "namespace": "mass",
            "filter": { "year": { "$gte": 2010, "$lte": 2015 } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {
                    "id": "a",
                    "score": 0.71,
                    "metadata": {
                        "text": "A landlord must return the deposit within thirty days.",
                        "case_name": "Smith v. Jones",
                        "citation": "460 Mass. 10",
                        "year": "2011",
                        "source": "SJC"
                    }
                },
                {
                    "id": "b",
                    "score": 0.93,
                    "metadata": {
                        "text": "Treble damages apply to deposit violations.",
                        "case_name": "Doe v. Roe",
                        "citation": "465 Mass. 200",
                        "year": 2013
                    }
                },
                {
                    "id": "c",
                    "score": 0.99,
                    "metadata": { "case_name": "Empty text" }
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let index = PineconeIndex::new(server.uri(), "pc-test")
        .unwrap()
        .with_namespace("mass");
    let agent = CaseLawAgent::new(Arc::new(FixedEmbedder), Arc::new(index)).with_top_k(5);

    let hits = agent
        .search(
            "security deposit treble damages",
            &SearchFilters::new(Some(2010), Some(2015)),
        )
        .await
        .unwrap();

    match hits {
        RetrievalHits::CaseLaw(excerpts) => {
            assert_eq!(excerpts.len(), 2);
            assert_eq!(excerpts[0].citation.formatted(), "Doe v. Roe, 465 Mass. 200 (2013)");
            assert_eq!(excerpts[1].citation.year, Some(2011));
            assert_eq!(excerpts[1].citation.source.as_deref(), Some("SJC"));
        }
        other => panic!("Expected case-law hits, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pinecone_server_error_is_case_law_retrieval_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(500).set_body_string("index unavailable"))
        .mount(&server)
        .await;

    let index = PineconeIndex::new(server.uri(), "pc-test").unwrap();
    let agent = CaseLawAgent::new(Arc::new(FixedEmbedder), Arc::new(index));

    match agent.search("deposit", &SearchFilters::default()).await {
        Err(AppError::Retrieval { component, message }) => {
            assert_eq!(component, RetrievalComponent::CaseLaw);
            assert!(message.contains("index unavailable"));
        }
        other => panic!("Expected retrieval error, got {:?}", other),
    }
}

// ============= OpenAI =============

#[cfg(feature = "openai")]
mod openai {
    use super::*;
    use juris::llm::openai::OpenAIClient;
    use juris::llm::OpenAIEmbedder;
    use juris::research::{ReportOptions, SynthesisAgent, SynthesisRequest};
    use juris::retrieval::{CaseCitation, CaseExcerpt};
    use juris::LlmSynthesizer;

    fn chat_response(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150 }
        })
    }

    #[tokio::test]
    async fn test_synthesis_through_openai_client() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({ "model": "gpt-4o" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
                "# Security Deposits in Massachusetts\n\n\
                 ## Executive Summary\n\nLandlords face treble damages.\n\n\
                 ## Conclusion\n\nComply with G.L. c. 186, s. 15B.",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAIClient::new(
            "sk-test".to_string(),
            server.uri(),
            "gpt-4o".to_string(),
        );
        let synthesizer = LlmSynthesizer::new(Arc::new(client));

        let excerpts = vec![CaseExcerpt {
            excerpt: "Treble damages apply to deposit violations.".to_string(),
            citation: CaseCitation {
                case_name: Some("Doe v. Roe".to_string()),
                citation: Some("465 Mass. 200".to_string()),
                year: Some(2013),
                source: None,
            },
            score: 0.9,
        }];
        let report = synthesizer
            .synthesize(SynthesisRequest {
                query: "security deposit law",
                case_law: Some(&excerpts),
                web: None,
                options: ReportOptions::default(),
                coverage_notes: &[],
            })
            .await
            .unwrap();

        assert_eq!(report.title, "Security Deposits in Massachusetts");
        assert_eq!(report.sections.len(), 2);
        assert_eq!(report.sections[0].heading, "Executive Summary");
        assert_eq!(report.case_citation_count(), 1);
        assert_eq!(report.model.as_deref(), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn test_openai_auth_failure_is_synthesis_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {
                    "message": "Incorrect API key provided",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": "invalid_api_key"
                }
            })))
            .mount(&server)
            .await;

        let client = OpenAIClient::new("sk-bad".to_string(), server.uri(), "gpt-4o".to_string());
        let synthesizer = LlmSynthesizer::new(Arc::new(client));

        let result = synthesizer
            .synthesize(SynthesisRequest {
                query: "security deposit law",
                case_law: None,
                web: None,
                options: ReportOptions::default(),
                coverage_notes: &[],
            })
            .await;

        assert!(matches!(result, Err(AppError::Synthesis(_))));
    }

    #[tokio::test]
    async fn test_openai_embedder_orders_by_index() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "model": "text-embedding-3-large",
                "data": [
                    { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                    { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
                ],
                "usage": { "prompt_tokens": 4, "total_tokens": 4 }
            })))
            .mount(&server)
            .await;

        let embedder = OpenAIEmbedder::new(
            "sk-test".to_string(),
            server.uri(),
            "text-embedding-3-large".to_string(),
        );

        let vectors = embedder
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }
}
