//! Query embedding for semantic case-law retrieval.

use crate::types::Result;
use async_trait::async_trait;

/// Turns text into dense vectors comparable with the case index.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Get the embedding model name
    fn model_name(&self) -> &str;
}

#[cfg(feature = "openai")]
pub use openai::OpenAIEmbedder;

#[cfg(feature = "openai")]
mod openai {
    use super::Embedder;
    use crate::types::{AppError, Result};
    use async_openai::{Client, config::OpenAIConfig, types::CreateEmbeddingRequestArgs};
    use async_trait::async_trait;

    /// Embeddings from the OpenAI API or any compatible endpoint.
    pub struct OpenAIEmbedder {
        client: Client<OpenAIConfig>,
        model: String,
    }

    impl OpenAIEmbedder {
        pub fn new(api_key: String, api_base: String, model: String) -> Self {
            let config = OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(api_base);

            Self {
                client: Client::with_config(config),
                model,
            }
        }
    }

    #[async_trait]
    impl Embedder for OpenAIEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut vectors = self.embed_batch(&[text.to_string()]).await?;
            vectors
                .pop()
                .ok_or_else(|| AppError::LLM("Empty embedding response".to_string()))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(texts.to_vec())
                .build()
                .map_err(|e| AppError::LLM(format!("Failed to build request: {}", e)))?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| AppError::LLM(format!("OpenAI embeddings error: {}", e)))?;

            let mut data = response.data;
            if data.len() != texts.len() {
                return Err(AppError::LLM(format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    data.len()
                )));
            }
            data.sort_by_key(|item| item.index);

            Ok(data.into_iter().map(|item| item.embedding).collect())
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }
}
