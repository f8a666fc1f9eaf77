//! Build runtime components from a [`JurisConfig`].

use super::toml_config::{
    CaseLawBackend, JurisConfig, LlmProviderKind, StorageBackend, WebProviderKind,
};
use crate::db::StorageProvider;
use crate::jobs::JobStore;
use crate::llm::{Embedder, LLMClient, Provider};
use crate::research::{LlmSynthesizer, Orchestrator, QueryAdvisor};
use crate::retrieval::{
    CaseIndex, CaseLawAgent, DuckDuckGoSearch, InMemoryCaseIndex, PineconeIndex, TavilySearch,
    WebSearchAgent, WebSearchProvider,
};
use crate::types::{AppError, Result};
use std::sync::Arc;

/// Storage selection with secrets resolved.
pub fn storage_provider(config: &JurisConfig) -> Result<StorageProvider> {
    let storage = &config.storage;
    Ok(match storage.backend {
        StorageBackend::Memory => StorageProvider::Memory,
        StorageBackend::Sqlite => StorageProvider::SQLite {
            path: storage.path.clone(),
        },
        StorageBackend::Turso => StorageProvider::Turso {
            url: config.require_env(&storage.turso_url_env)?,
            auth_token: config.require_env(&storage.turso_token_env)?,
        },
    })
}

pub fn llm_provider(config: &JurisConfig) -> Result<Provider> {
    let llm = &config.llm;
    Ok(match llm.provider {
        LlmProviderKind::OpenAI => Provider::OpenAI {
            api_key: config.require_env(&llm.api_key_env)?,
            api_base: llm.api_base.clone(),
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
        },
        LlmProviderKind::Ollama => Provider::Ollama {
            base_url: llm.base_url.clone(),
            model: llm.model.clone(),
        },
    })
}

#[cfg(feature = "openai")]
pub fn build_embedder(config: &JurisConfig) -> Result<Arc<dyn Embedder>> {
    let embeddings = &config.embeddings;
    Ok(Arc::new(crate::llm::OpenAIEmbedder::new(
        config.require_env(&embeddings.api_key_env)?,
        embeddings.api_base.clone(),
        embeddings.model.clone(),
    )))
}

#[cfg(not(feature = "openai"))]
pub fn build_embedder(_config: &JurisConfig) -> Result<Arc<dyn Embedder>> {
    Err(AppError::Configuration(
        "Case-law retrieval requires the 'openai' feature for embeddings".to_string(),
    ))
}

pub async fn build_case_law_agent(config: &JurisConfig) -> Result<CaseLawAgent> {
    let case_law = &config.case_law;
    let embedder = build_embedder(config)?;

    let index: Arc<dyn CaseIndex> = match case_law.backend {
        CaseLawBackend::Pinecone => {
            let host = case_law.pinecone_host.clone().ok_or_else(|| {
                AppError::Configuration("case_law.pinecone_host is not set".to_string())
            })?;
            let mut index =
                PineconeIndex::new(host, config.require_env(&case_law.pinecone_api_key_env)?)?;
            if let Some(namespace) = &case_law.namespace {
                index = index.with_namespace(namespace.clone());
            }
            Arc::new(index)
        }
        CaseLawBackend::Memory => {
            let path = case_law.seed_path.as_ref().ok_or_else(|| {
                AppError::Configuration("case_law.seed_path is not set".to_string())
            })?;
            let index = InMemoryCaseIndex::load(path, embedder.as_ref()).await?;
            tracing::info!(cases = index.len(), path = %path.display(), "Loaded case-law seed index");
            Arc::new(index)
        }
    };

    Ok(CaseLawAgent::new(embedder, index).with_top_k(case_law.top_k))
}

pub fn build_web_agent(config: &JurisConfig) -> Result<WebSearchAgent> {
    let web = &config.web;

    let provider: Arc<dyn WebSearchProvider> = match web.provider {
        WebProviderKind::Tavily => {
            let mut tavily = TavilySearch::new(config.require_env(&web.api_key_env)?)?
                .with_search_depth(web.search_depth.clone());
            if let Some(base_url) = &web.base_url {
                tavily = tavily.with_base_url(base_url.clone());
            }
            Arc::new(tavily)
        }
        WebProviderKind::DuckDuckGo => Arc::new(DuckDuckGoSearch::new()),
    };

    Ok(WebSearchAgent::new(provider)
        .with_max_results(web.max_results)
        .with_include_domains(web.include_domains.clone())
        .with_query_template(web.query_template.clone()))
}

/// Wire the orchestrator with every enabled component.
pub async fn build_orchestrator(
    config: &JurisConfig,
    store: Arc<dyn JobStore>,
) -> Result<Orchestrator> {
    let provider = llm_provider(config)?;
    let llm: Arc<dyn LLMClient> = Arc::from(provider.create_client().await?);
    let synthesizer =
        LlmSynthesizer::new(llm).with_jurisdiction(config.synthesis.jurisdiction.clone());

    let mut builder = Orchestrator::builder()
        .store(store)
        .synthesizer(Arc::new(synthesizer))
        .synthesis_timeout(config.synthesis_timeout())
        .advisor(QueryAdvisor::new(
            config.synthesis.jurisdiction.clone(),
            config.synthesis.jurisdiction_keywords.clone(),
        ));

    for component in config.enabled_components() {
        builder = builder.retrieval_timeout(component, config.retrieval_timeout(component));
    }
    if config.case_law.enabled {
        builder = builder.agent(Arc::new(build_case_law_agent(config).await?));
    }
    if config.web.enabled {
        builder = builder.agent(Arc::new(build_web_agent(config)?));
    }

    tracing::info!(
        provider = provider.name(),
        model = provider.model(),
        components = ?config.enabled_components(),
        "Orchestrator configured"
    );

    builder.build()
}
