//! Conformance test suite for `MemoryBackend`.
//!
//! One test per check for fine-grained failure reporting, plus `run_all`
//! to catch checks accidentally left out of the list below.

#![allow(clippy::expect_used, clippy::panic)]

use registry_storage::{MemoryBackend, conformance};

/// A small page size so listing checks cross page boundaries.
fn backend() -> MemoryBackend {
    MemoryBackend::with_page_size("conformance", 7)
}

// ============================================================================
// Objects
// ============================================================================

#[tokio::test]
async fn exists_false_for_missing_key() {
    conformance::exists_false_for_missing_key(&backend()).await;
}

#[tokio::test]
async fn put_then_get_returns_body() {
    conformance::put_then_get_returns_body(&backend()).await;
}

#[tokio::test]
async fn get_missing_is_not_found() {
    conformance::get_missing_is_not_found(&backend()).await;
}

#[tokio::test]
async fn put_overwrites() {
    conformance::put_overwrites(&backend()).await;
}

#[tokio::test]
async fn empty_body_roundtrip() {
    conformance::empty_body_roundtrip(&backend()).await;
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn list_filters_by_prefix() {
    conformance::list_filters_by_prefix(&backend()).await;
}

#[tokio::test]
async fn list_empty_prefix_returns_nothing() {
    conformance::list_empty_prefix_returns_nothing(&backend()).await;
}

#[tokio::test]
async fn list_spans_pages() {
    conformance::list_spans_pages(&backend()).await;
}

#[tokio::test]
async fn list_spans_pages_with_default_page_size() {
    conformance::list_spans_pages(&MemoryBackend::new("conformance")).await;
}

// ============================================================================
// Copy and presign
// ============================================================================

#[tokio::test]
async fn copy_keeps_source() {
    conformance::copy_keeps_source(&backend()).await;
}

#[tokio::test]
async fn copy_missing_source_fails() {
    conformance::copy_missing_source_fails(&backend()).await;
}

#[tokio::test]
async fn presign_references_key() {
    conformance::presign_references_key(&backend()).await;
}

#[tokio::test]
async fn run_all() {
    conformance::run_all(backend).await;
}
