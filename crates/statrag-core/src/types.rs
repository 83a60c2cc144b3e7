//! Domain types shared by the keyword index, the vector index and the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type ChunkId = String;

/// Id prefix reserved for documents shipped with the system.
pub const BASELINE_PREFIX: &str = "base:";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentOrigin {
    Baseline,
    User,
}

impl DocumentOrigin {
    pub fn of(doc_id: &str) -> Self {
        if doc_id.starts_with(BASELINE_PREFIX) { Self::Baseline } else { Self::User }
    }
}

/// A unit of retrievable knowledge.
///
/// `library` is the namespace (e.g. the source package) and never changes
/// after creation; moving a document means deleting and re-adding it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub doc_id: String,
    pub title: String,
    pub library: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub origin: DocumentOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn from_input(input: DocumentInput, now: DateTime<Utc>) -> Self {
        let origin = DocumentOrigin::of(&input.doc_id);
        Self {
            doc_id: input.doc_id,
            title: input.title,
            library: input.library,
            category: input.category,
            content: input.content,
            summary: input.summary,
            origin,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_baseline(&self) -> bool { self.origin == DocumentOrigin::Baseline }

    /// Applies the supplied fields. Returns true when `content` changed.
    pub fn apply(&mut self, patch: DocumentPatch, now: DateTime<Utc>) -> bool {
        let mut content_changed = false;
        if let Some(title) = patch.title { self.title = title; }
        if let Some(category) = patch.category { self.category = Some(category); }
        if let Some(summary) = patch.summary { self.summary = Some(summary); }
        if let Some(content) = patch.content {
            content_changed = content != self.content;
            self.content = content;
        }
        self.updated_at = now;
        content_changed
    }
}

/// Construction contract for new documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentInput {
    pub doc_id: String,
    pub title: String,
    pub library: String,
    #[serde(default)]
    pub category: Option<String>,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
}

impl DocumentInput {
    pub fn new(doc_id: impl Into<String>, title: impl Into<String>, library: impl Into<String>, content: impl Into<String>) -> Self {
        Self { doc_id: doc_id.into(), title: title.into(), library: library.into(), content: content.into(), ..Default::default() }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self { self.category = Some(category.into()); self }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self { self.summary = Some(summary.into()); self }

    pub fn validate(&self) -> Result<(), Error> {
        for (field, value) in [("doc_id", &self.doc_id), ("title", &self.title), ("library", &self.library), ("content", &self.content)] {
            if value.trim().is_empty() { return Err(Error::Validation(format!("{field} must not be empty"))); }
        }
        Ok(())
    }
}

/// Partial update; `None` leaves the field untouched. `library` is not patchable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl DocumentPatch {
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) { return Err(Error::Validation("title must not be empty".into())); }
        if self.content.as_deref().is_some_and(|c| c.trim().is_empty()) { return Err(Error::Validation("content must not be empty".into())); }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.category.is_none() && self.content.is_none() && self.summary.is_none()
    }
}

/// A bounded slice of a document's content; the atomic unit of indexing.
///
/// `chunk_id` is derived from `doc_id` and `position`, so re-chunking the same
/// content yields the same ids. `embedding` is only set once the embedding
/// provider succeeded for this chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub doc_id: String,
    pub text: String,
    pub position: usize,
    pub total_chunks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

pub fn chunk_id(doc_id: &str, position: usize) -> ChunkId { format!("{doc_id}:{position}") }

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
    Fused,
}

/// The minimal surface returned by all engines.
///
/// `id` matches `Chunk::chunk_id`. `score` is engine-specific but
/// higher is always better. `source` labels the origin engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Fts5,
    Vector,
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fts5 => "fts5",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fts5" => Ok(Self::Fts5),
            "vector" => Ok(Self::Vector),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::UnknownSearchMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub doc_id: String,
    pub chunk_id: ChunkId,
    pub title: String,
    pub library: String,
    pub content: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub response_time: u64,
    pub mode: SearchMode,
    pub degraded: bool,
    pub generation: u64,
    pub candidates: usize,
}

/// Ephemeral per-query result; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub model: ModelInfo,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RebuildError {
    pub doc_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    pub total_docs: usize,
    pub processed_docs: usize,
    pub success_docs: usize,
    pub failed_docs: usize,
    pub total_chunks: usize,
    pub errors: Vec<RebuildError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RebuildProgress {
    pub percentage: u8,
    pub current: usize,
    pub total: usize,
    pub current_doc_title: String,
}
