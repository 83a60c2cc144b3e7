#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use statrag_core::config::Settings;
use statrag_core::error::{Error, Result};
use statrag_core::traits::{EmbeddingProvider, InferenceProvider};
use statrag_core::types::DocumentInput;
use statrag_embed::{ExtractiveInference, FixedProviders, HashedEmbedder, ProviderFactory};
use statrag_engine::{InitOptions, RagService};

/// A latch that embed calls wait on while it is closed.
#[derive(Default)]
pub struct Gate {
    open: AtomicBool,
    notify: Notify,
}

impl Gate {
    pub fn opened() -> Arc<Self> {
        let gate = Arc::new(Self::default());
        gate.open();
        gate
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn close(&self) { self.open.store(false, Ordering::SeqCst); }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.open.load(Ordering::SeqCst) { return; }
            notified.await;
        }
    }
}

/// Hashed embeddings with switches for failing, blocking and wrong-length output.
pub struct ScriptedEmbedder {
    inner: HashedEmbedder,
    pub gate: Arc<Gate>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    /// Texts containing this marker come back one element short.
    pub truncate_on: Mutex<Option<String>>,
}

impl ScriptedEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { inner: HashedEmbedder::new("scripted", 128, 100_000).expect("valid dimension"), gate: Gate::opened(), fail: AtomicBool::new(false), calls: AtomicUsize::new(0), truncate_on: Mutex::new(None) })
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn name(&self) -> &str { "scripted" }
    fn embedder_id(&self) -> &str { self.inner.embedder_id() }
    fn dim(&self) -> Option<usize> { self.inner.dim() }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.gate.wait().await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) { return Err(Error::provider("scripted", "backend unavailable")); }
        let mut v = self.inner.embed_sync(text)?;
        if self.truncate_on.lock().as_deref().is_some_and(|m| text.contains(m)) { v.pop(); }
        Ok(v)
    }
}

/// Counts how many times providers are built.
pub struct CountingFactory {
    pub inner: FixedProviders,
    pub builds: Arc<AtomicUsize>,
}

impl ProviderFactory for CountingFactory {
    fn embedding(&self, model: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.inner.embedding(model)
    }

    fn inference(&self, model: &str) -> Result<Arc<dyn InferenceProvider>> { self.inner.inference(model) }
}

pub fn fixed(embedder: &Arc<ScriptedEmbedder>) -> FixedProviders {
    FixedProviders::new(embedder.clone(), Arc::new(ExtractiveInference::new("extractive")))
}

pub fn corpus() -> Vec<DocumentInput> {
    vec![
        DocumentInput::new("A", "t-test basics", "scipy", "A t-test compares the means of two samples. Welch's t-test drops the equal variance assumption."),
        DocumentInput::new("B", "ANOVA overview", "statsmodels", "Analysis of variance (ANOVA) compares the means of three or more groups using an F statistic."),
        DocumentInput::new("C", "regression intro", "statsmodels", "Linear regression models a response as a linear function of predictors fitted by least squares."),
    ]
}

pub fn options() -> InitOptions { InitOptions::new("scripted", "extractive") }

pub fn service_with(embedder: &Arc<ScriptedEmbedder>, settings: Settings, baseline: Vec<DocumentInput>) -> RagService {
    RagService::builder().settings(settings).providers(fixed(embedder)).baseline_documents(baseline).build()
}

pub async fn ready_service(embedder: &Arc<ScriptedEmbedder>) -> RagService {
    let svc = service_with(embedder, Settings::default(), corpus());
    svc.initialize(options()).await.unwrap();
    svc
}
