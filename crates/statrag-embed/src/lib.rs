//! statrag-embed
//!
//! Embedding and inference providers: an offline hashed embedder, an offline
//! extractive answerer, and HTTP clients for Ollama and OpenAI-compatible hosts.

pub mod extractive;
pub mod factory;
pub mod hashed;
pub mod ollama;
pub mod openai;

pub use extractive::ExtractiveInference;
pub use factory::{parse_model_spec, ConfiguredProviders, EmbeddingKind, FixedProviders, InferenceKind, ProviderFactory};
pub use hashed::HashedEmbedder;
pub use ollama::{OllamaEmbedder, OllamaInference};
pub use openai::{OpenAiEmbedder, OpenAiInference};
