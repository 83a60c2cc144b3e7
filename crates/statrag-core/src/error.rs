use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Document id already exists: {0}")]
    DuplicateId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("RAG service is not initialized")]
    NotInitialized,

    #[error("Provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown search mode '{0}' (expected fts5, vector or hybrid)")]
    UnknownSearchMode(String),

    #[error("A rebuild is already in progress")]
    RebuildInProgress,

    #[error("Document is read-only: {0}")]
    ReadOnly(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Provider { provider: provider.into(), message: message.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
