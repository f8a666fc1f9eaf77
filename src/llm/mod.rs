//! LLM Provider Clients and Abstractions
//!
//! Synthesis talks to a completion model through [`LLMClient`]; case-law
//! retrieval embeds queries through [`Embedder`]. Concrete clients are selected
//! at runtime with [`Provider`].
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `openai` - OpenAI API and compatible endpoints (completions and embeddings)
//! - `ollama` - Local Ollama server (completions)

/// Core LLM client trait and provider selection.
pub mod client;
/// Embedding trait and clients.
pub mod embeddings;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, Provider};
pub use embeddings::Embedder;
#[cfg(feature = "openai")]
pub use embeddings::OpenAIEmbedder;
