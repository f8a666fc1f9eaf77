//! TOML-based configuration for JURIS
//!
//! The server is configured by a single `juris.toml`. Secrets never live in
//! the file: sections name the environment variable that holds them
//! (`api_key_env`, `turso_token_env`, ...), and those are resolved at startup
//! after `.env` has been loaded.

use crate::retrieval::web::{
    default_include_domains, DEFAULT_MAX_RESULTS, DEFAULT_QUERY_TEMPLATE,
};
use crate::retrieval::{case_law::DEFAULT_TOP_K, RetrievalComponent};
use crate::types::AppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from juris.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JurisConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding endpoint used by case-law retrieval
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    #[serde(default)]
    pub case_law: CaseLawConfig,

    #[serde(default)]
    pub web: WebConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    #[serde(default)]
    pub retention: RetentionConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

// ============= Storage Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
    Turso,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database file for the `sqlite` backend
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Environment variable holding the Turso database URL
    #[serde(default = "default_turso_url_env")]
    pub turso_url_env: String,

    /// Environment variable holding the Turso auth token
    #[serde(default = "default_turso_token_env")]
    pub turso_token_env: String,
}

fn default_database_path() -> String {
    "./data/juris.db".to_string()
}

fn default_turso_url_env() -> String {
    "TURSO_DATABASE_URL".to_string()
}

fn default_turso_token_env() -> String {
    "TURSO_AUTH_TOKEN".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_database_path(),
            turso_url_env: default_turso_url_env(),
            turso_token_env: default_turso_token_env(),
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    OpenAI,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable containing the API key (openai)
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openai_base")]
    pub api_base: String,

    /// Ollama server URL (ollama)
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_llm_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            model: default_llm_model(),
            api_key_env: default_openai_key_env(),
            api_base: default_openai_base(),
            base_url: default_ollama_url(),
            temperature: None,
            max_tokens: None,
        }
    }
}

// ============= Embeddings Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openai_base")]
    pub api_base: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            api_base: default_openai_base(),
            model: default_embedding_model(),
        }
    }
}

// ============= Retrieval Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseLawBackend {
    #[default]
    Pinecone,
    /// In-process index seeded from a JSON file
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseLawConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: CaseLawBackend,

    /// Pinecone index host, e.g. `my-index-abc123.svc.us-east-1.pinecone.io`
    #[serde(default)]
    pub pinecone_host: Option<String>,

    #[serde(default = "default_pinecone_key_env")]
    pub pinecone_api_key_env: String,

    #[serde(default)]
    pub namespace: Option<String>,

    /// JSON seed file for the `memory` backend
    #[serde(default)]
    pub seed_path: Option<PathBuf>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_pinecone_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_retrieval_timeout() -> u64 {
    60
}

impl Default for CaseLawConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CaseLawBackend::default(),
            pinecone_host: None,
            pinecone_api_key_env: default_pinecone_key_env(),
            namespace: None,
            seed_path: None,
            top_k: default_top_k(),
            timeout_secs: default_retrieval_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebProviderKind {
    #[default]
    Tavily,
    DuckDuckGo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub provider: WebProviderKind,

    /// Environment variable containing the Tavily API key
    #[serde(default = "default_tavily_key_env")]
    pub api_key_env: String,

    /// Override the provider endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_include_domains")]
    pub include_domains: Vec<String>,

    /// Framing applied to the user query; `{query}` is replaced
    #[serde(default = "default_query_template")]
    pub query_template: String,

    #[serde(default = "default_search_depth")]
    pub search_depth: String,

    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,
}

fn default_tavily_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_query_template() -> String {
    DEFAULT_QUERY_TEMPLATE.to_string()
}

fn default_search_depth() -> String {
    "advanced".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: WebProviderKind::default(),
            api_key_env: default_tavily_key_env(),
            base_url: None,
            max_results: default_max_results(),
            include_domains: default_include_domains(),
            query_template: default_query_template(),
            search_depth: default_search_depth(),
            timeout_secs: default_retrieval_timeout(),
        }
    }
}

// ============= Synthesis Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default = "default_synthesis_timeout")]
    pub timeout_secs: u64,

    /// Jurisdiction named in prompts and query advisories
    #[serde(default = "default_jurisdiction")]
    pub jurisdiction: String,

    /// Words that count as naming the jurisdiction in a query
    #[serde(default = "default_jurisdiction_keywords")]
    pub jurisdiction_keywords: Vec<String>,
}

fn default_synthesis_timeout() -> u64 {
    300
}

fn default_jurisdiction() -> String {
    "Massachusetts".to_string()
}

fn default_jurisdiction_keywords() -> Vec<String> {
    vec!["massachusetts".to_string(), "mass".to_string()]
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_synthesis_timeout(),
            jurisdiction: default_jurisdiction(),
            jurisdiction_keywords: default_jurisdiction_keywords(),
        }
    }
}

// ============= Retention Configuration =============

/// Eviction of finished jobs. Nothing is evicted unless `max_age_secs` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default)]
    pub max_age_secs: Option<u64>,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_secs: None,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// ============= Errors =============

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl JurisConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_unchecked(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating, for tooling that reports problems itself
    pub fn load_unchecked<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.case_law.enabled && !self.web.enabled {
            return Err(ConfigError::ValidationError(
                "At least one of [case_law] or [web] must be enabled".to_string(),
            ));
        }

        match self.storage.backend {
            StorageBackend::Memory => {}
            StorageBackend::Sqlite => {
                if self.storage.path.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "storage.path must be set for the sqlite backend".to_string(),
                    ));
                }
            }
            StorageBackend::Turso => {
                self.validate_env_var(&self.storage.turso_url_env)?;
                self.validate_env_var(&self.storage.turso_token_env)?;
            }
        }

        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.model must not be empty".to_string(),
            ));
        }
        if self.llm.provider == LlmProviderKind::OpenAI {
            self.validate_env_var(&self.llm.api_key_env)?;
        }

        if self.case_law.enabled {
            if self.case_law.top_k == 0 {
                return Err(ConfigError::ValidationError(
                    "case_law.top_k must be greater than 0".to_string(),
                ));
            }
            match self.case_law.backend {
                CaseLawBackend::Pinecone => {
                    let host_missing = self
                        .case_law
                        .pinecone_host
                        .as_deref()
                        .map(|h| h.trim().is_empty())
                        .unwrap_or(true);
                    if host_missing {
                        return Err(ConfigError::ValidationError(
                            "case_law.pinecone_host must be set for the pinecone backend"
                                .to_string(),
                        ));
                    }
                    self.validate_env_var(&self.case_law.pinecone_api_key_env)?;
                }
                CaseLawBackend::Memory => {
                    if self.case_law.seed_path.is_none() {
                        return Err(ConfigError::ValidationError(
                            "case_law.seed_path must be set for the memory backend".to_string(),
                        ));
                    }
                }
            }
            self.validate_env_var(&self.embeddings.api_key_env)?;
        }

        if self.web.enabled {
            if self.web.max_results == 0 {
                return Err(ConfigError::ValidationError(
                    "web.max_results must be greater than 0".to_string(),
                ));
            }
            if !self.web.query_template.contains("{query}") {
                return Err(ConfigError::ValidationError(
                    "web.query_template must contain {query}".to_string(),
                ));
            }
            if self.web.provider == WebProviderKind::Tavily {
                self.validate_env_var(&self.web.api_key_env)?;
            }
        }

        let timeouts = [
            ("case_law.timeout_secs", self.case_law.timeout_secs),
            ("web.timeout_secs", self.web.timeout_secs),
            ("synthesis.timeout_secs", self.synthesis.timeout_secs),
        ];
        for (name, secs) in timeouts {
            if secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.retention.max_age_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "retention.max_age_secs must be greater than 0 when set".to_string(),
            ));
        }
        if self.retention.max_age_secs.is_some() && self.retention.sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "retention.sweep_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        self.require_env(name).map(|_| ())
    }

    /// Resolve an environment variable reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }

    pub fn require_env(&self, env_name: &str) -> Result<String, ConfigError> {
        self.resolve_env(env_name)
            .ok_or_else(|| ConfigError::MissingEnvVar(env_name.to_string()))
    }

    /// Components switched on in this configuration
    pub fn enabled_components(&self) -> Vec<RetrievalComponent> {
        let mut components = Vec::new();
        if self.case_law.enabled {
            components.push(RetrievalComponent::CaseLaw);
        }
        if self.web.enabled {
            components.push(RetrievalComponent::Web);
        }
        components
    }

    pub fn retrieval_timeout(&self, component: RetrievalComponent) -> Duration {
        match component {
            RetrievalComponent::CaseLaw => Duration::from_secs(self.case_law.timeout_secs),
            RetrievalComponent::Web => Duration::from_secs(self.web.timeout_secs),
        }
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis.timeout_secs)
    }

    pub fn retention_max_age(&self) -> Option<Duration> {
        self.retention.max_age_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.retention.sweep_interval_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
