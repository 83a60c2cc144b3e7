//! The `RagService` façade.
//!
//! Lifecycle: `Uninitialized -> Initializing -> Ready`, and `Ready -> Rebuilding -> Ready`
//! while a rebuild runs. Reads go against whichever index generation is
//! published when they start; writers (document mutations and rebuilds) are
//! serialized and publish a new generation when done.

use futures::stream::BoxStream;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, info, warn};

use statrag_core::baseline::{into_baseline, load_baseline_dir};
use statrag_core::config::{ProviderConfig, Settings};
use statrag_core::error::{Error, Result};
use statrag_core::traits::{ContextChunk, EmbeddingProvider, InferenceProvider};
use statrag_core::types::{
    Document, DocumentInput, DocumentOrigin, DocumentPatch, ModelInfo, RagResponse, RebuildProgress, RebuildReport, ResponseMetadata, SearchMode, Source,
};
use statrag_embed::{ConfiguredProviders, ProviderFactory};
use statrag_hybrid::{IndexHandle, Retrieval};
use statrag_vector::EmbeddingCache;

use crate::prompt::{build_request, snippet};
use crate::rebuild::{build_generation, embed_document};
use crate::store::{DocumentFilter, DocumentPage, DocumentStore, LibraryCount, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
    Rebuilding,
}

/// Model ids handed to the provider factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOptions {
    pub embedding_model: String,
    pub inference_model: String,
}

impl InitOptions {
    pub fn new(embedding_model: impl Into<String>, inference_model: impl Into<String>) -> Self {
        Self { embedding_model: embedding_model.into(), inference_model: inference_model.into() }
    }

    pub fn from_config(config: &ProviderConfig) -> Self { Self::new(&config.embedding_model, &config.inference_model) }

    fn validate(&self) -> Result<()> {
        if self.embedding_model.trim().is_empty() { return Err(Error::InvalidConfig("embedding model must not be empty".into())); }
        if self.inference_model.trim().is_empty() { return Err(Error::InvalidConfig("inference model must not be empty".into())); }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub sources: Vec<Source>,
    pub metadata: ResponseMetadata,
}

/// A query whose answer arrives as a stream of text fragments.
pub struct RagStream {
    pub sources: Vec<Source>,
    pub model: ModelInfo,
    pub metadata: ResponseMetadata,
    pub answer: BoxStream<'static, Result<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub state: ServiceState,
    pub baseline_docs: usize,
    pub user_docs: usize,
    pub chunks: usize,
    pub vectors: usize,
    pub unembedded_docs: usize,
    pub generation: u64,
    pub embedder: String,
    pub inference: String,
}

struct Runtime {
    store: RwLock<DocumentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    inference: Arc<dyn InferenceProvider>,
    index: IndexHandle,
    cache: EmbeddingCache,
}

impl Runtime {
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: self.inference.name().to_string(),
            embedding: Some(self.embedder.embedder_id().to_string()),
            inference: Some(self.inference.model().to_string()),
        }
    }
}

struct Retrieved {
    retrieval: Retrieval,
    sources: Vec<Source>,
    context: Vec<ContextChunk>,
}

pub struct RagService {
    settings: Settings,
    factory: Arc<dyn ProviderFactory>,
    baseline: Option<Vec<DocumentInput>>,
    state: Mutex<ServiceState>,
    runtime: RwLock<Option<Arc<Runtime>>>,
    init_lock: tokio::sync::Mutex<()>,
    write_lock: tokio::sync::Mutex<()>,
    rebuilding: AtomicBool,
}

static GLOBAL: OnceLock<RagService> = OnceLock::new();

#[derive(Default)]
pub struct RagServiceBuilder {
    settings: Option<Settings>,
    factory: Option<Arc<dyn ProviderFactory>>,
    baseline: Option<Vec<DocumentInput>>,
}

impl RagServiceBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn providers(mut self, factory: impl ProviderFactory + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Uses these baseline documents instead of `storage.baseline_dir`.
    pub fn baseline_documents(mut self, docs: Vec<DocumentInput>) -> Self {
        self.baseline = Some(docs);
        self
    }

    pub fn build(self) -> RagService {
        let settings = self.settings.unwrap_or_default();
        let factory = self.factory.unwrap_or_else(|| Arc::new(ConfiguredProviders::new(settings.providers.clone())));
        RagService {
            settings,
            factory,
            baseline: self.baseline,
            state: Mutex::new(ServiceState::Uninitialized),
            runtime: RwLock::new(None),
            init_lock: tokio::sync::Mutex::new(()),
            write_lock: tokio::sync::Mutex::new(()),
            rebuilding: AtomicBool::new(false),
        }
    }
}

/// Clears the rebuild flag and leaves `Rebuilding` when a rebuild ends, however it ends.
struct RebuildGuard<'a>(&'a RagService);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.0.state.lock();
            if *state == ServiceState::Rebuilding { *state = ServiceState::Ready; }
        }
        self.0.rebuilding.store(false, Ordering::Release);
    }
}

impl RagService {
    pub fn builder() -> RagServiceBuilder { RagServiceBuilder::default() }

    /// Process-wide instance, configured from `Settings::load` on first use.
    pub fn global() -> Result<&'static RagService> {
        if let Some(service) = GLOBAL.get() { return Ok(service); }
        let service = RagService::builder().settings(Settings::load()?).build();
        Ok(GLOBAL.get_or_init(|| service))
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn state(&self) -> ServiceState { *self.state.lock() }

    fn set_state(&self, next: ServiceState) {
        let mut state = self.state.lock();
        debug!(from = ?*state, to = ?next, "state transition");
        *state = next;
    }

    fn current(&self) -> Option<Arc<Runtime>> { self.runtime.read().clone() }

    fn runtime(&self) -> Result<Arc<Runtime>> { self.current().ok_or(Error::NotInitialized) }

    /// Builds providers, loads the store and indexes it. Calls on a ready
    /// service return at once; concurrent calls wait for the one in flight.
    pub async fn initialize(&self, options: InitOptions) -> Result<()> {
        if self.current().is_some() { return Ok(()); }
        let _init = self.init_lock.lock().await;
        if self.current().is_some() {
            debug!("initialize: already ready");
            return Ok(());
        }
        options.validate()?;
        self.settings.validate()?;
        self.set_state(ServiceState::Initializing);
        match self.start(&options).await {
            Ok(runtime) => {
                *self.runtime.write() = Some(Arc::new(runtime));
                self.set_state(ServiceState::Ready);
                info!(embedding = %options.embedding_model, inference = %options.inference_model, "rag service ready");
                Ok(())
            }
            Err(e) => {
                self.set_state(ServiceState::Uninitialized);
                warn!(error = %e, "rag service failed to initialize");
                Err(e)
            }
        }
    }

    async fn start(&self, options: &InitOptions) -> Result<Runtime> {
        let embedder = self.factory.embedding(&options.embedding_model)?;
        let inference = self.factory.inference(&options.inference_model)?;
        let baseline = match (&self.baseline, self.settings.storage.baseline_path()) {
            (Some(docs), _) => into_baseline(docs.clone())?,
            (None, Some(dir)) => load_baseline_dir(&dir)?,
            (None, None) => Vec::new(),
        };
        let store = DocumentStore::open(baseline, self.settings.storage.user_store_path())?;
        let cache = EmbeddingCache::new();
        let (snapshot, report) =
            build_generation(store.all(), &self.settings.chunking, embedder.as_ref(), &cache, self.settings.rebuild.progress_step, |_| {}).await;
        if report.failed_docs > 0 {
            warn!(failed = report.failed_docs, "some documents could not be indexed at startup");
        }
        let index = IndexHandle::default();
        index.publish(snapshot);
        Ok(Runtime { store: RwLock::new(store), embedder, inference, index, cache })
    }

    /// Tears the service down to `Uninitialized`, after any in-flight write.
    pub async fn shutdown(&self) {
        let _init = self.init_lock.lock().await;
        let _write = self.write_lock.lock().await;
        let previous = self.runtime.write().take();
        if previous.is_some() { info!("rag service shut down"); }
        self.set_state(ServiceState::Uninitialized);
    }

    // ---- documents ----

    /// Adds a user document and indexes it.
    ///
    /// If embedding fails the document is kept and keyword-searchable, and the
    /// provider error is returned; it stays out of vector search until it is
    /// re-embedded by an update or a rebuild.
    pub async fn add_document(&self, input: DocumentInput) -> Result<String> {
        let rt = self.runtime()?;
        let _write = self.write_lock.lock().await;
        let doc = rt.store.write().add(input)?;
        info!(doc_id = %doc.doc_id, "document added");
        self.index_document(&rt, &doc).await?;
        Ok(doc.doc_id)
    }

    /// Applies `patch`; `Ok(false)` when `doc_id` does not exist.
    pub async fn update_document(&self, doc_id: &str, patch: DocumentPatch) -> Result<bool> {
        let rt = self.runtime()?;
        let _write = self.write_lock.lock().await;
        let updated = rt.store.write().update(doc_id, patch)?;
        let Some((doc, content_changed)) = updated else { return Ok(false) };
        let embedded = rt.index.load().is_embedded(doc_id);
        if content_changed || !embedded {
            self.index_document(&rt, &doc).await?;
        }
        info!(doc_id, content_changed, "document updated");
        Ok(true)
    }

    /// Removes a user document from the store and both indices; `Ok(false)` when unknown.
    pub async fn delete_document(&self, doc_id: &str) -> Result<bool> {
        let rt = self.runtime()?;
        let _write = self.write_lock.lock().await;
        let removed = rt.store.write().delete(doc_id)?;
        if !removed { return Ok(false); }
        let mut next = (*rt.index.load()).clone();
        let chunks = next.remove_document(doc_id);
        let generation = rt.index.publish(next);
        info!(doc_id, chunks, generation, "document deleted");
        Ok(true)
    }

    async fn index_document(&self, rt: &Runtime, doc: &Document) -> Result<()> {
        let (chunks, vectors) = embed_document(doc, &self.settings.chunking, rt.embedder.as_ref(), &rt.cache).await;
        let mut next = (*rt.index.load()).clone();
        let outcome = vectors.and_then(|v| next.replace_document(&doc.doc_id, &chunks, Some(&v)));
        let result = match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(doc_id = %doc.doc_id, error = %e, "not embedded; indexed for keyword search only");
                next.replace_document(&doc.doc_id, &chunks, None)?;
                Err(e)
            }
        };
        let generation = rt.index.publish(next);
        debug!(doc_id = %doc.doc_id, chunks = chunks.len(), generation, "document indexed");
        result
    }

    pub fn get_document(&self, doc_id: &str) -> Result<Option<Document>> { Ok(self.runtime()?.store.read().get(doc_id).cloned()) }

    pub fn list_documents(&self, filter: &DocumentFilter, page: Page) -> Result<DocumentPage> { Ok(self.runtime()?.store.read().list(filter, page)) }

    pub fn libraries(&self) -> Result<Vec<LibraryCount>> { Ok(self.runtime()?.store.read().libraries()) }

    /// Documents that are keyword-indexed but have no vectors.
    pub fn unembedded_documents(&self) -> Result<Vec<String>> {
        let rt = self.runtime()?;
        let snapshot = rt.index.load();
        let store = rt.store.read();
        Ok(store.all().iter().filter(|d| snapshot.contains_document(&d.doc_id) && !snapshot.is_embedded(&d.doc_id)).map(|d| d.doc_id.clone()).collect())
    }

    // ---- queries ----

    async fn retrieve(&self, rt: &Runtime, text: &str, mode: SearchMode, top_k: Option<usize>) -> Result<Retrieved> {
        if text.trim().is_empty() { return Err(Error::Validation("query must not be empty".into())); }
        let top_k = top_k.unwrap_or(self.settings.search.top_k).max(1);
        let embedding = match mode {
            SearchMode::Fts5 => None,
            SearchMode::Vector | SearchMode::Hybrid => Some(rt.embedder.embed(text).await),
        };
        let snapshot = rt.index.load();
        let retrieval = snapshot.retrieve(text, embedding, mode, top_k, &self.settings.search)?;
        if retrieval.degraded { warn!(mode = %mode, "hybrid query degraded to keyword-only"); }

        let store = rt.store.read();
        let mut sources = Vec::with_capacity(retrieval.chunks.len());
        let mut context = Vec::with_capacity(retrieval.chunks.len());
        for c in &retrieval.chunks {
            let Some(doc) = store.get(&c.doc_id) else { continue };
            sources.push(Source {
                doc_id: c.doc_id.clone(),
                chunk_id: c.chunk_id.clone(),
                title: doc.title.clone(),
                library: doc.library.clone(),
                content: snippet(&c.text, self.settings.search.snippet_chars),
                score: c.score,
            });
            context.push(ContextChunk { title: doc.title.clone(), text: c.text.clone() });
        }
        Ok(Retrieved { retrieval, sources, context })
    }

    fn metadata(started: Instant, mode: SearchMode, retrieval: &Retrieval) -> ResponseMetadata {
        ResponseMetadata {
            response_time: started.elapsed().as_millis() as u64,
            mode,
            degraded: retrieval.degraded,
            generation: retrieval.generation,
            candidates: retrieval.candidates,
        }
    }

    /// Retrieval only: ranked sources without calling the inference provider.
    pub async fn search(&self, text: &str, mode: SearchMode, top_k: Option<usize>) -> Result<SearchResponse> {
        let started = Instant::now();
        let rt = self.runtime()?;
        let found = self.retrieve(&rt, text, mode, top_k).await?;
        Ok(SearchResponse { metadata: Self::metadata(started, mode, &found.retrieval), sources: found.sources })
    }

    /// Retrieves context for `text` and asks the inference provider for a grounded answer.
    pub async fn query(&self, text: &str, mode: SearchMode) -> Result<RagResponse> {
        let started = Instant::now();
        let rt = self.runtime()?;
        let found = self.retrieve(&rt, text, mode, None).await?;
        let request = build_request(text, found.context);
        let answer = rt.inference.complete(&request).await?;
        Ok(RagResponse { answer, sources: found.sources, model: rt.model_info(), metadata: Self::metadata(started, mode, &found.retrieval) })
    }

    /// Like `query`, but the answer is streamed. `metadata.response_time` covers retrieval only.
    pub async fn query_stream(&self, text: &str, mode: SearchMode) -> Result<RagStream> {
        let started = Instant::now();
        let rt = self.runtime()?;
        let found = self.retrieve(&rt, text, mode, None).await?;
        let metadata = Self::metadata(started, mode, &found.retrieval);
        let request = build_request(text, found.context);
        let answer = rt.inference.complete_stream(&request).await?;
        Ok(RagStream { sources: found.sources, model: rt.model_info(), metadata, answer })
    }

    // ---- rebuild ----

    /// Re-chunks and re-embeds every document into a fresh generation.
    ///
    /// The document list is captured once the rebuild holds the write lock;
    /// mutations that arrive meanwhile wait and apply to the new generation.
    /// A second rebuild while one runs fails with `RebuildInProgress`.
    pub async fn rebuild<F>(&self, on_progress: F) -> Result<RebuildReport>
    where
        F: FnMut(&RebuildProgress) + Send,
    {
        self.run_rebuild(false, on_progress).await
    }

    /// Discards all user documents, then rebuilds from the baseline set.
    pub async fn restore_baseline<F>(&self, on_progress: F) -> Result<RebuildReport>
    where
        F: FnMut(&RebuildProgress) + Send,
    {
        self.run_rebuild(true, on_progress).await
    }

    async fn run_rebuild<F>(&self, restore: bool, on_progress: F) -> Result<RebuildReport>
    where
        F: FnMut(&RebuildProgress) + Send,
    {
        let rt = self.runtime()?;
        if self.rebuilding.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(Error::RebuildInProgress);
        }
        let _guard = RebuildGuard(self);
        let _write = self.write_lock.lock().await;
        self.set_state(ServiceState::Rebuilding);
        if restore {
            let dropped = rt.store.write().restore_baseline()?;
            info!(dropped, "user documents discarded");
        }
        let docs = rt.store.read().all().to_vec();
        rt.cache.clear();
        info!(documents = docs.len(), "rebuild started");
        let (snapshot, report) =
            build_generation(&docs, &self.settings.chunking, rt.embedder.as_ref(), &rt.cache, self.settings.rebuild.progress_step, on_progress).await;
        let generation = rt.index.publish(snapshot);
        info!(generation, ok = report.success_docs, failed = report.failed_docs, "rebuild finished");
        Ok(report)
    }

    pub fn stats(&self) -> Result<ServiceStats> {
        let rt = self.runtime()?;
        let snapshot = rt.index.load();
        let unembedded_docs = self.unembedded_documents()?.len();
        let store = rt.store.read();
        Ok(ServiceStats {
            state: self.state(),
            baseline_docs: store.count(DocumentOrigin::Baseline),
            user_docs: store.count(DocumentOrigin::User),
            chunks: snapshot.chunk_count(),
            vectors: snapshot.vector_count(),
            unembedded_docs,
            generation: snapshot.generation(),
            embedder: rt.embedder.embedder_id().to_string(),
            inference: format!("{}:{}", rt.inference.name(), rt.inference.model()),
        })
    }
}
