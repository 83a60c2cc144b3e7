//! Document store: the read-only baseline set plus the durable user set.
//!
//! Baseline documents come first in listing order, followed by user documents
//! in insertion order. Only the user set is persisted; the file is rewritten
//! atomically after every mutation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use statrag_core::error::{Error, Result};
use statrag_core::types::{Document, DocumentInput, DocumentOrigin, DocumentPatch, BASELINE_PREFIX};

const STORE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct UserStoreFile {
    version: u32,
    documents: Vec<Document>,
}

/// Listing filter. Unset fields match everything; `text` is a
/// case-insensitive substring match on title and content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub library: Option<String>,
    pub category: Option<String>,
    pub origin: Option<DocumentOrigin>,
    pub text: Option<String>,
}

impl DocumentFilter {
    fn matches(&self, doc: &Document, needle: Option<&str>) -> bool {
        self.library.as_deref().map_or(true, |l| doc.library == l)
            && self.category.as_deref().map_or(true, |c| doc.category.as_deref() == Some(c))
            && self.origin.map_or(true, |o| doc.origin == o)
            && needle.map_or(true, |n| doc.title.to_lowercase().contains(n) || doc.content.to_lowercase().contains(n))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self { Self { offset: 0, limit: 50 } }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentPage {
    pub total: usize,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryCount {
    pub library: String,
    pub documents: usize,
}

pub struct DocumentStore {
    docs: Vec<Document>,
    by_id: HashMap<String, usize>,
    user_path: Option<PathBuf>,
}

impl DocumentStore {
    /// In-memory store; user documents are lost on drop.
    pub fn in_memory(baseline: Vec<DocumentInput>) -> Result<Self> { Self::open(baseline, None) }

    /// Loads the baseline set and, when `user_path` exists, the persisted user set.
    pub fn open(baseline: Vec<DocumentInput>, user_path: Option<PathBuf>) -> Result<Self> {
        let now = Utc::now();
        let mut store = Self { docs: Vec::new(), by_id: HashMap::new(), user_path };
        for input in baseline {
            if !input.doc_id.starts_with(BASELINE_PREFIX) {
                return Err(Error::Validation(format!("baseline id '{}' must start with '{BASELINE_PREFIX}'", input.doc_id)));
            }
            input.validate()?;
            store.insert(Document::from_input(input, now))?;
        }
        if let Some(path) = store.user_path.as_deref().filter(|p| p.exists()) {
            let file: UserStoreFile = serde_json::from_str(&fs::read_to_string(path)?)?;
            if file.version != STORE_VERSION {
                return Err(Error::InvalidConfig(format!("{}: unsupported store version {}", path.display(), file.version)));
            }
            debug!(path = %path.display(), documents = file.documents.len(), "loaded user store");
            for doc in file.documents {
                if doc.is_baseline() { return Err(Error::Validation(format!("user store holds baseline id '{}'", doc.doc_id))); }
                store.insert(doc)?;
            }
        }
        Ok(store)
    }

    fn insert(&mut self, doc: Document) -> Result<()> {
        if self.by_id.contains_key(&doc.doc_id) { return Err(Error::DuplicateId(doc.doc_id)); }
        self.by_id.insert(doc.doc_id.clone(), self.docs.len());
        self.docs.push(doc);
        Ok(())
    }

    fn reindex(&mut self) {
        self.by_id = self.docs.iter().enumerate().map(|(i, d)| (d.doc_id.clone(), i)).collect();
    }

    /// Adds a user document and persists the user set.
    pub fn add(&mut self, input: DocumentInput) -> Result<Document> {
        input.validate()?;
        if input.doc_id.starts_with(BASELINE_PREFIX) {
            return Err(Error::Validation(format!("'{BASELINE_PREFIX}' ids are reserved for baseline documents")));
        }
        let doc = Document::from_input(input, Utc::now());
        self.insert(doc.clone())?;
        if let Err(e) = self.persist() {
            self.docs.pop();
            self.by_id.remove(&doc.doc_id);
            return Err(e);
        }
        Ok(doc)
    }

    /// Applies `patch`. `Ok(None)` when the id is unknown; otherwise the updated
    /// document and whether its content changed.
    pub fn update(&mut self, doc_id: &str, patch: DocumentPatch) -> Result<Option<(Document, bool)>> {
        let Some(&i) = self.by_id.get(doc_id) else { return Ok(None) };
        if self.docs[i].is_baseline() { return Err(Error::ReadOnly(doc_id.to_string())); }
        patch.validate()?;
        let previous = self.docs[i].clone();
        let content_changed = self.docs[i].apply(patch, Utc::now());
        if let Err(e) = self.persist() {
            self.docs[i] = previous;
            return Err(e);
        }
        Ok(Some((self.docs[i].clone(), content_changed)))
    }

    /// Removes a user document. `Ok(false)` when the id is unknown.
    pub fn delete(&mut self, doc_id: &str) -> Result<bool> {
        let Some(&i) = self.by_id.get(doc_id) else { return Ok(false) };
        if self.docs[i].is_baseline() { return Err(Error::ReadOnly(doc_id.to_string())); }
        let removed = self.docs.remove(i);
        self.reindex();
        if let Err(e) = self.persist() {
            self.docs.insert(i, removed);
            self.reindex();
            return Err(e);
        }
        Ok(true)
    }

    /// Drops every user document and clears the durable store. Returns how many were dropped.
    pub fn restore_baseline(&mut self) -> Result<usize> {
        let before = self.docs.len();
        let kept: Vec<Document> = self.docs.iter().filter(|d| d.is_baseline()).cloned().collect();
        let dropped = std::mem::replace(&mut self.docs, kept);
        self.reindex();
        if let Err(e) = self.persist() {
            self.docs = dropped;
            self.reindex();
            return Err(e);
        }
        Ok(before - self.docs.len())
    }

    pub fn get(&self, doc_id: &str) -> Option<&Document> { self.by_id.get(doc_id).map(|&i| &self.docs[i]) }

    /// All documents in stable order: baseline first, then user documents as added.
    pub fn all(&self) -> &[Document] { &self.docs }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn count(&self, origin: DocumentOrigin) -> usize { self.docs.iter().filter(|d| d.origin == origin).count() }

    pub fn list(&self, filter: &DocumentFilter, page: Page) -> DocumentPage {
        let needle = filter.text.as_deref().map(str::to_lowercase).filter(|n| !n.is_empty());
        let matching: Vec<&Document> = self.docs.iter().filter(|d| filter.matches(d, needle.as_deref())).collect();
        DocumentPage { total: matching.len(), documents: matching.into_iter().skip(page.offset).take(page.limit).cloned().collect() }
    }

    /// Each library with its document count, sorted by name.
    pub fn libraries(&self) -> Vec<LibraryCount> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for d in &self.docs { *counts.entry(d.library.as_str()).or_default() += 1; }
        counts.into_iter().map(|(library, documents)| LibraryCount { library: library.to_string(), documents }).collect()
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = self.user_path.as_deref() else { return Ok(()) };
        let file = UserStoreFile { version: STORE_VERSION, documents: self.docs.iter().filter(|d| !d.is_baseline()).cloned().collect() };
        write_atomic(path, &serde_json::to_vec_pretty(&file)?)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
