//! Provider selection from model ids.
//!
//! A model id may carry a provider prefix (`ollama:nomic-embed-text`). Only
//! the known kinds are treated as prefixes, so Ollama tags like `llama3:8b`
//! pass through whole and use the configured default kind.

use std::str::FromStr;
use std::sync::Arc;

use statrag_core::config::ProviderConfig;
use statrag_core::error::{Error, Result};
use statrag_core::traits::{EmbeddingProvider, InferenceProvider};

use crate::extractive::ExtractiveInference;
use crate::hashed::HashedEmbedder;
use crate::ollama::{self, OllamaEmbedder, OllamaInference};
use crate::openai::{self, OpenAiEmbedder, OpenAiInference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingKind {
    Hashed,
    Ollama,
    OpenAi,
}

impl FromStr for EmbeddingKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hashed" => Ok(Self::Hashed),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::InvalidConfig(format!("unknown embedding provider '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceKind {
    Extractive,
    Ollama,
    OpenAi,
}

impl FromStr for InferenceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "extractive" => Ok(Self::Extractive),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::InvalidConfig(format!("unknown inference provider '{other}'"))),
        }
    }
}

/// Splits `kind:model` when `kind` parses as `K`; otherwise the whole string
/// is the model and `default` names the kind.
pub fn parse_model_spec<K: FromStr<Err = Error>>(spec: &str, default: &str) -> Result<(K, String)> {
    let spec = spec.trim();
    if spec.is_empty() { return Err(Error::InvalidConfig("model id must not be empty".into())); }
    if let Some((prefix, rest)) = spec.split_once(':') {
        if let Ok(kind) = prefix.parse::<K>() {
            if rest.is_empty() { return Err(Error::InvalidConfig(format!("model id '{spec}' has no model after the prefix"))); }
            return Ok((kind, rest.to_string()));
        }
    }
    Ok((default.parse::<K>()?, spec.to_string()))
}

/// Builds providers for model ids handed to `initialize`.
pub trait ProviderFactory: Send + Sync {
    fn embedding(&self, model: &str) -> Result<Arc<dyn EmbeddingProvider>>;
    fn inference(&self, model: &str) -> Result<Arc<dyn InferenceProvider>>;
}

/// Default factory backed by `[providers]` configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredProviders {
    config: ProviderConfig,
}

impl ConfiguredProviders {
    pub fn new(config: ProviderConfig) -> Self { Self { config } }

    fn base_url<'a>(&'a self, fallback: &'a str) -> &'a str { self.config.base_url.as_deref().unwrap_or(fallback) }
}

impl ProviderFactory for ConfiguredProviders {
    fn embedding(&self, model: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        let (kind, model) = parse_model_spec::<EmbeddingKind>(model, &self.config.embedding)?;
        let c = &self.config;
        Ok(match kind {
            EmbeddingKind::Hashed => Arc::new(HashedEmbedder::new(&model, c.hashed_dim, c.max_input_chars)?),
            EmbeddingKind::Ollama => Arc::new(OllamaEmbedder::new(self.base_url(ollama::DEFAULT_BASE_URL), &model, c.timeout_secs)?),
            EmbeddingKind::OpenAi => Arc::new(OpenAiEmbedder::new(self.base_url(openai::DEFAULT_BASE_URL), &model, c.timeout_secs)?),
        })
    }

    fn inference(&self, model: &str) -> Result<Arc<dyn InferenceProvider>> {
        let (kind, model) = parse_model_spec::<InferenceKind>(model, &self.config.inference)?;
        let c = &self.config;
        Ok(match kind {
            InferenceKind::Extractive => Arc::new(ExtractiveInference::new(&model)),
            InferenceKind::Ollama => Arc::new(OllamaInference::new(self.base_url(ollama::DEFAULT_BASE_URL), &model, c.timeout_secs)?),
            InferenceKind::OpenAi => Arc::new(OpenAiInference::new(self.base_url(openai::DEFAULT_BASE_URL), &model, c.timeout_secs)?),
        })
    }
}

/// Hands out the same provider instances regardless of model id.
#[derive(Clone)]
pub struct FixedProviders {
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub inference: Arc<dyn InferenceProvider>,
}

impl FixedProviders {
    pub fn new(embedding: Arc<dyn EmbeddingProvider>, inference: Arc<dyn InferenceProvider>) -> Self { Self { embedding, inference } }
}

impl ProviderFactory for FixedProviders {
    fn embedding(&self, _model: &str) -> Result<Arc<dyn EmbeddingProvider>> { Ok(self.embedding.clone()) }
    fn inference(&self, _model: &str) -> Result<Arc<dyn InferenceProvider>> { Ok(self.inference.clone()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_selects_kind() {
        let (kind, model) = parse_model_spec::<EmbeddingKind>("ollama:nomic-embed-text", "hashed").unwrap();
        assert_eq!(kind, EmbeddingKind::Ollama);
        assert_eq!(model, "nomic-embed-text");
    }

    #[test]
    fn unknown_prefix_stays_in_model_id() {
        let (kind, model) = parse_model_spec::<InferenceKind>("llama3:8b", "ollama").unwrap();
        assert_eq!(kind, InferenceKind::Ollama);
        assert_eq!(model, "llama3:8b");
    }

    #[test]
    fn empty_or_bad_default_is_invalid_config() {
        assert!(matches!(parse_model_spec::<EmbeddingKind>("  ", "hashed"), Err(Error::InvalidConfig(_))));
        assert!(matches!(parse_model_spec::<EmbeddingKind>("mini", "sentencepiece"), Err(Error::InvalidConfig(_))));
        assert!(matches!(parse_model_spec::<EmbeddingKind>("hashed:", "hashed"), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn configured_factory_builds_offline_providers() {
        let factory = ConfiguredProviders::new(ProviderConfig { hashed_dim: 32, ..Default::default() });
        let e = factory.embedding("stats-mini").unwrap();
        assert_eq!(e.embedder_id(), "hashed:stats-mini:d32");
        assert_eq!(e.dim(), Some(32));
        let i = factory.inference("extractive").unwrap();
        assert_eq!(i.name(), "extractive");
    }
}
