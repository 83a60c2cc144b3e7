mod common;

use common::{ready_service, ScriptedEmbedder};
use statrag_core::types::{DocumentInput, DocumentPatch, SearchMode};

const WELCH: &str = "Welch's t-test compares two means without assuming equal variances.";

#[tokio::test]
async fn unchanged_content_is_not_re_embedded() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;
    svc.add_document(DocumentInput::new("welch", "Welch", "notes", WELCH)).await.unwrap();
    let before = embedder.calls();

    let retitle = DocumentPatch { title: Some("Welch's test".into()), ..Default::default() };
    assert!(svc.update_document("welch", retitle).await.unwrap());
    let same = DocumentPatch { content: Some(WELCH.into()), ..Default::default() };
    assert!(svc.update_document("welch", same).await.unwrap());
    assert_eq!(embedder.calls(), before);
}

#[tokio::test]
async fn identical_text_is_served_from_the_cache() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;
    svc.add_document(DocumentInput::new("first", "Welch", "notes", WELCH)).await.unwrap();
    let before = embedder.calls();
    assert!(svc.delete_document("first").await.unwrap());

    svc.add_document(DocumentInput::new("second", "Welch again", "notes", WELCH)).await.unwrap();
    assert_eq!(embedder.calls(), before);
    assert!(svc.unembedded_documents().unwrap().is_empty());
    let hits = svc.search("welch equal variances", SearchMode::Vector, None).await.unwrap();
    assert_eq!(hits.sources[0].doc_id, "second");
}

#[tokio::test]
async fn rebuild_clears_the_cache_and_embeds_every_chunk() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;
    let chunks = svc.stats().unwrap().chunks;
    assert_eq!(embedder.calls(), chunks, "startup embeds each chunk once");

    svc.rebuild(|_| {}).await.unwrap();
    assert_eq!(embedder.calls(), 2 * chunks);
    svc.rebuild(|_| {}).await.unwrap();
    assert_eq!(embedder.calls(), 3 * chunks);
}

#[tokio::test]
async fn wrong_length_embedding_fails_only_that_document() {
    let embedder = ScriptedEmbedder::new();
    let svc = ready_service(&embedder).await;
    *embedder.truncate_on.lock() = Some("least squares".into());

    let report = svc.rebuild(|_| {}).await.unwrap();
    assert_eq!((report.total_docs, report.success_docs, report.failed_docs), (3, 2, 1));
    assert_eq!(report.errors[0].doc_id, "base:C");
    assert!(report.errors[0].error.contains("dimension mismatch"), "{}", report.errors[0].error);
    *embedder.truncate_on.lock() = None;

    for mode in [SearchMode::Fts5, SearchMode::Vector, SearchMode::Hybrid] {
        let hits = svc.search("least squares regression", mode, Some(10)).await.unwrap();
        assert!(hits.sources.iter().all(|s| s.doc_id != "base:C"), "{mode}");
    }
    let t_test = svc.search("t-test", SearchMode::Hybrid, None).await.unwrap();
    assert_eq!(t_test.sources[0].doc_id, "base:A");
}
