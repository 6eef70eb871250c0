//! Integration test verifying that `#[instrument]` annotations produce
//! spans for facade, migration and backend operations.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use registry_storage::{
    MemoryBackend, RecordingReporter, StorageBackend,
    testutil::{ctx, registry},
};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Span collector: records the name of every span as it is created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

fn collect() -> (Arc<Mutex<Vec<String>>>, tracing::subscriber::DefaultGuard) {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let subscriber = tracing_subscriber::registry().with(collector);
    (spans, tracing::subscriber::set_default(subscriber))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_backend_put_creates_span() {
    let (spans, _guard) = collect();

    let backend = MemoryBackend::new("bucket");
    backend.put("key-1", Bytes::from("value-1")).await.expect("put should succeed");

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "put"), "expected a 'put' span, got: {recorded:?}");
}

#[tokio::test]
async fn upload_module_nests_backend_spans() {
    let (spans, _guard) = collect();

    let (_, storage) = registry("");
    storage
        .upload_module(&ctx(), "acme", "vpc", "aws", "1.0.0", Bytes::new())
        .await
        .expect("upload should succeed");

    let recorded = spans.lock().expect("lock poisoned");
    for expected in ["upload_module", "exists", "put", "get_module", "presign"] {
        assert!(
            recorded.iter().any(|s| s == expected),
            "expected a '{expected}' span, got: {recorded:?}"
        );
    }
}

#[tokio::test]
async fn list_provider_versions_creates_span() {
    let (spans, _guard) = collect();

    let (_, storage) = registry("");
    let _ = storage.list_provider_versions(&ctx(), "acme", "foo").await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "list_provider_versions"),
        "expected a 'list_provider_versions' span, got: {recorded:?}"
    );
    assert!(
        recorded.iter().any(|s| s == "list_page"),
        "expected a 'list_page' span, got: {recorded:?}"
    );
}

#[tokio::test]
async fn migrate_modules_creates_span() {
    let (spans, _guard) = collect();

    let (_, storage) = registry("");
    let _ = storage.migrate_modules(&ctx(), &RecordingReporter::new(), true).await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "migrate_modules"),
        "expected a 'migrate_modules' span, got: {recorded:?}"
    );
}

#[tokio::test]
async fn signing_keys_load_creates_span() {
    let (spans, _guard) = collect();

    let (_, storage) = registry("");
    let _ = storage.signing_keys(&ctx(), "acme").await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "load"), "expected a 'load' span, got: {recorded:?}");
}
