//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_SEARCH__TOP_K`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub chunk_size: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap_percent: 0.2 }
    }
}

impl ChunkingConfig {
    pub fn overlap_chars(&self) -> usize { (self.chunk_size as f32 * self.overlap_percent) as usize }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 { return Err(Error::InvalidConfig("chunking.chunk_size must be > 0".into())); }
        if !(0.0..=0.9).contains(&self.overlap_percent) {
            return Err(Error::InvalidConfig(format!("chunking.overlap_percent must be within [0, 0.9], got {}", self.overlap_percent)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    pub rrf_k: f32,
    /// Hybrid mode retrieves `top_k * candidate_multiplier` from each index before fusion.
    pub candidate_multiplier: usize,
    pub snippet_chars: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 5, rrf_k: 60.0, candidate_multiplier: 3, snippet_chars: 300 }
    }
}

impl SearchConfig {
    pub fn candidate_k(&self, top_k: usize) -> usize { top_k.saturating_mul(self.candidate_multiplier.max(1)) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Default embedding provider kind when the model id carries no prefix.
    pub embedding: String,
    /// Default inference provider kind when the model id carries no prefix.
    pub inference: String,
    pub embedding_model: String,
    pub inference_model: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub hashed_dim: usize,
    pub max_input_chars: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            embedding: "hashed".into(),
            inference: "extractive".into(),
            embedding_model: "stats-mini".into(),
            inference_model: "extractive".into(),
            base_url: None,
            timeout_secs: 60,
            hashed_dim: 384,
            max_input_chars: 8192,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub baseline_dir: Option<String>,
    pub user_store: Option<String>,
}

impl StorageConfig {
    pub fn baseline_path(&self) -> Option<PathBuf> { self.baseline_dir.as_deref().map(expand_path) }

    pub fn user_store_path(&self) -> Option<PathBuf> { self.user_store.as_deref().map(expand_path) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RebuildConfig {
    /// Percentage points between two progress callbacks.
    pub progress_step: u8,
}

impl Default for RebuildConfig {
    fn default() -> Self { Self { progress_step: 5 } }
}

/// Engine settings, see `Settings::load` for the merge order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    pub providers: ProviderConfig,
    pub storage: StorageConfig,
    pub rebuild: RebuildConfig,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::from_figment(Self::figment(&env_name, Path::new(".")))
    }

    /// Loads from `dir/config.toml` and friends instead of the working directory.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::from_figment(Self::figment(&env_name, dir))
    }

    fn figment(env_name: &str, dir: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment.merge(Env::prefixed("APP_").split("__"))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.search.top_k == 0 { return Err(Error::InvalidConfig("search.top_k must be > 0".into())); }
        if self.search.rrf_k < 0.0 { return Err(Error::InvalidConfig("search.rrf_k must not be negative".into())); }
        if self.providers.hashed_dim == 0 { return Err(Error::InvalidConfig("providers.hashed_dim must be > 0".into())); }
        if self.rebuild.progress_step == 0 { return Err(Error::InvalidConfig("rebuild.progress_step must be > 0".into())); }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
