//! Conformance test suite for [`StorageBackend`] implementations.
//!
//! Each function checks one part of the backend contract against a fresh,
//! empty backend. Every backend (in-memory, S3-compatible, or third-party)
//! can run the same suite.
//!
//! # Usage
//!
//! Enable the `testutil` feature and call the checks with a fresh backend:
//!
//! ```no_run
//! use registry_storage::{MemoryBackend, conformance};
//!
//! #[tokio::test]
//! async fn exists_false_for_missing_key() {
//!     conformance::exists_false_for_missing_key(&MemoryBackend::new("test")).await;
//! }
//! ```
//!
//! # Test Categories
//!
//! | Category | Contract aspect |
//! |----------|-----------------|
//! | Objects | `exists` / `get` / `put` semantics and not-found mapping |
//! | Listing | prefix filtering and transparent pagination |
//! | Copy | server-side copy leaves the source in place |
//! | Presign | URLs reference the key |

use std::time::Duration;

use bytes::Bytes;

use crate::{backend::StorageBackend, error::StorageError};

// ============================================================================
// Objects
// ============================================================================

/// `exists` on a missing key is `Ok(false)`, not an error.
pub async fn exists_false_for_missing_key<B: StorageBackend>(backend: &B) {
    let result = backend.exists("conformance/missing").await;
    assert!(matches!(result, Ok(false)), "missing key should report Ok(false): {result:?}");
}

/// `put` then `exists` and `get` round-trips the body.
pub async fn put_then_get_returns_body<B: StorageBackend>(backend: &B) {
    backend.put("conformance/object", Bytes::from("body")).await.expect("put");
    assert!(backend.exists("conformance/object").await.expect("exists"));
    let body = backend.get("conformance/object").await.expect("get");
    assert_eq!(body, Bytes::from("body"));
}

/// `get` on a missing key is [`StorageError::NotFound`].
pub async fn get_missing_is_not_found<B: StorageBackend>(backend: &B) {
    let result = backend.get("conformance/absent").await;
    assert!(
        matches!(result, Err(StorageError::NotFound { .. })),
        "expected NotFound, got: {result:?}"
    );
}

/// `put` on an existing key replaces the body.
pub async fn put_overwrites<B: StorageBackend>(backend: &B) {
    backend.put("conformance/overwrite", Bytes::from("one")).await.expect("put");
    backend.put("conformance/overwrite", Bytes::from("two")).await.expect("overwrite");
    let body = backend.get("conformance/overwrite").await.expect("get");
    assert_eq!(body, Bytes::from("two"));
}

/// Empty bodies are stored and returned as empty.
pub async fn empty_body_roundtrip<B: StorageBackend>(backend: &B) {
    backend.put("conformance/empty", Bytes::new()).await.expect("put");
    assert!(backend.get("conformance/empty").await.expect("get").is_empty());
}

// ============================================================================
// Listing
// ============================================================================

/// `list` returns only keys under the prefix, in lexicographic order.
pub async fn list_filters_by_prefix<B: StorageBackend>(backend: &B) {
    for key in ["conformance/list/b", "conformance/list/a", "conformance/listing", "other/x"] {
        backend.put(key, Bytes::new()).await.expect("put");
    }
    let keys = backend.list("conformance/list/").await.expect("list");
    assert_eq!(keys, ["conformance/list/a", "conformance/list/b"]);
}

/// `list` on an empty prefix returns no keys.
pub async fn list_empty_prefix_returns_nothing<B: StorageBackend>(backend: &B) {
    let keys = backend.list("conformance/nothing-here/").await.expect("list");
    assert!(keys.is_empty(), "expected no keys, got: {keys:?}");
}

/// `list` aggregates across pages: every key appears exactly once.
pub async fn list_spans_pages<B: StorageBackend>(backend: &B) {
    let expected: Vec<String> = (0..25).map(|i| format!("conformance/paged/{i:03}")).collect();
    for key in &expected {
        backend.put(key, Bytes::from_static(b"x")).await.expect("put");
    }
    let keys = backend.list("conformance/paged/").await.expect("list");
    assert_eq!(keys, expected);
}

// ============================================================================
// Copy
// ============================================================================

/// `copy` duplicates the body and keeps the source.
pub async fn copy_keeps_source<B: StorageBackend>(backend: &B) {
    backend.put("conformance/copy/src", Bytes::from("payload")).await.expect("put");
    backend.copy("conformance/copy/src", "conformance/copy/dst").await.expect("copy");
    assert_eq!(backend.get("conformance/copy/dst").await.expect("get dst"), Bytes::from("payload"));
    assert!(backend.exists("conformance/copy/src").await.expect("exists src"));
}

/// `copy` from a missing source fails and does not create the destination.
pub async fn copy_missing_source_fails<B: StorageBackend>(backend: &B) {
    let result = backend.copy("conformance/copy/ghost", "conformance/copy/out").await;
    assert!(result.is_err(), "copy of missing source should fail");
    assert!(!backend.exists("conformance/copy/out").await.expect("exists"));
}

// ============================================================================
// Presign
// ============================================================================

/// `presign` returns a non-empty URL that references the key.
pub async fn presign_references_key<B: StorageBackend>(backend: &B) {
    let url = backend
        .presign("conformance/presign/archive.zip", Duration::from_secs(60))
        .await
        .expect("presign");
    assert!(url.contains("archive.zip"), "url should reference the key: {url}");
}

/// Runs every check, each against a fresh, empty backend from `factory`.
pub async fn run_all<B, F>(factory: F)
where
    B: StorageBackend,
    F: Fn() -> B,
{
    exists_false_for_missing_key(&factory()).await;
    put_then_get_returns_body(&factory()).await;
    get_missing_is_not_found(&factory()).await;
    put_overwrites(&factory()).await;
    empty_body_roundtrip(&factory()).await;
    list_filters_by_prefix(&factory()).await;
    list_empty_prefix_returns_nothing(&factory()).await;
    list_spans_pages(&factory()).await;
    copy_keeps_source(&factory()).await;
    copy_missing_source_fails(&factory()).await;
    presign_references_key(&factory()).await;
}
