mod common;

use futures::StreamExt;
use std::sync::atomic::Ordering;

use common::{corpus, options, ready_service, service_with, ScriptedEmbedder};
use statrag_core::config::Settings;
use statrag_core::types::{DocumentInput, DocumentPatch, SearchMode};
use statrag_core::Error;
use statrag_embed::ConfiguredProviders;
use statrag_engine::RagService;

const MODES: [SearchMode; 3] = [SearchMode::Fts5, SearchMode::Vector, SearchMode::Hybrid];

async fn ranked(svc: &RagService, text: &str, mode: SearchMode) -> Vec<String> {
    svc.search(text, mode, Some(5)).await.unwrap().sources.into_iter().map(|s| s.chunk_id).collect()
}

#[tokio::test]
async fn three_document_scenario() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;

    let kw = svc.search("t-test", SearchMode::Fts5, None).await.unwrap();
    assert_eq!(kw.sources[0].doc_id, "base:A");
    assert_eq!(kw.sources[0].title, "t-test basics");

    let vec = svc.search("analysis of variance ANOVA groups F statistic", SearchMode::Vector, None).await.unwrap();
    assert_eq!(vec.sources[0].doc_id, "base:B");

    let hybrid = svc.search("t-test", SearchMode::Hybrid, None).await.unwrap();
    assert_eq!(hybrid.sources[0].doc_id, "base:A");
    assert!(!hybrid.metadata.degraded);
    assert!(hybrid.metadata.candidates >= hybrid.sources.len());
}

#[tokio::test]
async fn rankings_are_deterministic_and_rebuild_is_idempotent() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;
    let queries = ["means", "variance of groups", "least squares regression"];
    let mut before = Vec::new();
    for q in queries {
        for mode in MODES {
            let first = ranked(&svc, q, mode).await;
            assert_eq!(ranked(&svc, q, mode).await, first, "{q} / {mode}");
            before.push(first);
        }
    }
    svc.rebuild(|_| {}).await.unwrap();
    svc.rebuild(|_| {}).await.unwrap();
    let mut after = Vec::new();
    for q in queries {
        for mode in MODES { after.push(ranked(&svc, q, mode).await); }
    }
    assert_eq!(before, after);
}

#[tokio::test]
async fn deleted_document_never_returns() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;
    svc.add_document(DocumentInput::new("welch", "Welch notes", "notes", "Welch's unequal variances t-test with Satterthwaite degrees of freedom.")).await.unwrap();
    for mode in MODES {
        let hits = svc.search("welch satterthwaite", mode, None).await.unwrap();
        assert!(hits.sources.iter().any(|s| s.doc_id == "welch"), "{mode} finds it before delete");
    }
    assert!(svc.delete_document("welch").await.unwrap());
    assert!(!svc.delete_document("welch").await.unwrap());
    for mode in MODES {
        let hits = svc.search("welch satterthwaite", mode, Some(10)).await.unwrap();
        assert!(hits.sources.iter().all(|s| s.doc_id != "welch"), "{mode} after delete");
    }
    let stats = svc.stats().unwrap();
    assert_eq!((stats.chunks, stats.vectors), (3, 3));
}

#[tokio::test]
async fn update_replaces_stale_chunks() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;
    svc.add_document(DocumentInput::new("normality", "Normality checks", "notes", "Kolmogorov-Smirnov compares a sample with a reference distribution.")).await.unwrap();
    let patch = DocumentPatch { content: Some("Shapiro-Wilk tests whether a sample came from a normal distribution.".into()), ..Default::default() };
    assert!(svc.update_document("normality", patch).await.unwrap());
    assert!(!svc.update_document("missing", DocumentPatch { title: Some("x".into()), ..Default::default() }).await.unwrap());

    assert!(svc.search("kolmogorov smirnov", SearchMode::Fts5, None).await.unwrap().sources.is_empty());
    for mode in MODES {
        let hits = svc.search("shapiro wilk kolmogorov", mode, Some(10)).await.unwrap();
        assert!(hits.sources.iter().all(|s| !s.content.contains("Kolmogorov")), "{mode}");
        assert!(hits.sources.iter().any(|s| s.doc_id == "normality"), "{mode}");
    }
}

#[tokio::test]
async fn hybrid_degrades_but_vector_mode_fails_when_embedding_fails() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;
    embedder.fail.store(true, Ordering::SeqCst);

    let hybrid = svc.search("t-test", SearchMode::Hybrid, None).await.unwrap();
    assert!(hybrid.metadata.degraded);
    assert_eq!(hybrid.sources[0].doc_id, "base:A");

    assert!(matches!(svc.search("t-test", SearchMode::Vector, None).await, Err(Error::Provider { .. })));
    assert!(!svc.search("t-test", SearchMode::Fts5, None).await.unwrap().metadata.degraded);
}

#[tokio::test]
async fn failed_embedding_on_add_keeps_document_keyword_searchable() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;
    embedder.fail.store(true, Ordering::SeqCst);
    let err = svc.add_document(DocumentInput::new("bootstrap", "Bootstrap", "notes", "Bootstrap resampling estimates a confidence interval.")).await;
    assert!(matches!(err, Err(Error::Provider { .. })));
    assert!(svc.get_document("bootstrap").unwrap().is_some());
    assert_eq!(svc.unembedded_documents().unwrap(), vec!["bootstrap".to_string()]);
    embedder.fail.store(false, Ordering::SeqCst);

    let kw = svc.search("bootstrap resampling", SearchMode::Fts5, None).await.unwrap();
    assert_eq!(kw.sources[0].doc_id, "bootstrap");
    let vec = svc.search("bootstrap resampling", SearchMode::Vector, Some(10)).await.unwrap();
    assert!(vec.sources.iter().all(|s| s.doc_id != "bootstrap"));

    // A title-only update still re-embeds a document that has no vectors.
    assert!(svc.update_document("bootstrap", DocumentPatch { title: Some("Bootstrap CI".into()), ..Default::default() }).await.unwrap());
    assert!(svc.unembedded_documents().unwrap().is_empty());
    let vec = svc.search("bootstrap resampling", SearchMode::Vector, None).await.unwrap();
    assert_eq!(vec.sources[0].doc_id, "bootstrap");
}

#[tokio::test]
async fn rebuild_collects_per_document_failures() {
    let mut settings = Settings::default();
    settings.providers.max_input_chars = 200;
    let mut docs = corpus();
    docs.push(DocumentInput::new("huge", "Oversized", "misc", "bootstrap ".repeat(40)));
    let svc = RagService::builder().settings(settings.clone()).providers(ConfiguredProviders::new(settings.providers.clone())).baseline_documents(docs).build();
    svc.initialize(options_hashed()).await.unwrap();

    let report = svc.rebuild(|_| {}).await.unwrap();
    assert_eq!((report.total_docs, report.success_docs, report.failed_docs), (4, 3, 1));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].doc_id, "base:huge");
    assert!(report.errors[0].error.contains("char limit"));

    for mode in MODES {
        let hits = svc.search("t-test", mode, None).await.unwrap();
        assert_eq!(hits.sources[0].doc_id, "base:A", "{mode}");
    }
    assert!(svc.search("bootstrap", SearchMode::Fts5, None).await.unwrap().sources.is_empty());
}

fn options_hashed() -> statrag_engine::InitOptions { statrag_engine::InitOptions::new("hashed:stats-mini", "extractive") }

#[tokio::test]
async fn query_answers_from_retrieved_context() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;
    let res = svc.query("How does a t-test compare samples?", SearchMode::Hybrid).await.unwrap();
    assert!(res.answer.starts_with("According to t-test basics"), "{}", res.answer);
    assert_eq!(res.sources[0].doc_id, "base:A");
    assert_eq!(res.model.provider, "extractive");
    assert_eq!(res.model.embedding.as_deref(), Some("hashed:scripted:d128"));
    assert_eq!(res.metadata.mode, SearchMode::Hybrid);
    assert!(matches!(svc.query("   ", SearchMode::Hybrid).await, Err(Error::Validation(_))));
}

#[tokio::test]
async fn query_stream_yields_the_answer() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;
    let stream = svc.query_stream("anova", SearchMode::Fts5).await.unwrap();
    assert_eq!(stream.sources[0].doc_id, "base:B");
    let parts: Vec<String> = stream.answer.map(|r| r.unwrap()).collect().await;
    assert_eq!(parts.len(), 1);
    assert!(parts[0].contains("ANOVA overview"));
}

#[tokio::test]
async fn listing_and_stats_cover_both_sets() {
    let embedder = ScriptedEmbedder::new();
    let svc = service_with(&embedder, Settings::default(), corpus());
    svc.initialize(options()).await.unwrap();
    svc.add_document(DocumentInput::new("n1", "Power analysis", "notes", "Sample size from effect size and alpha.").with_category("design")).await.unwrap();

    let libs = svc.libraries().unwrap();
    assert_eq!(libs.iter().map(|l| (l.library.as_str(), l.documents)).collect::<Vec<_>>(), vec![("notes", 1), ("scipy", 1), ("statsmodels", 2)]);
    let page = svc.list_documents(&statrag_engine::DocumentFilter { library: Some("statsmodels".into()), ..Default::default() }, statrag_engine::Page { offset: 0, limit: 1 }).unwrap();
    assert_eq!((page.total, page.documents.len()), (2, 1));
    assert_eq!(page.documents[0].doc_id, "base:B");

    let stats = svc.stats().unwrap();
    assert_eq!((stats.baseline_docs, stats.user_docs, stats.unembedded_docs), (3, 1, 0));
    assert_eq!(stats.chunks, 4);
    assert_eq!(stats.vectors, 4);
}
