//! In-memory object store backend.
//!
//! [`MemoryBackend`] implements [`StorageBackend`] over a [`BTreeMap`] and is
//! meant for tests and local development.
//!
//! # Features
//!
//! - **Thread-safe**: uses [`parking_lot::RwLock`] for concurrent access
//! - **Ordered listing**: keys come back in lexicographic order, like S3
//! - **Real pagination**: listings are split into pages of a configurable size
//!   so callers exercise continuation handling
//! - **Operation counters**: `put`/`copy` counts for asserting on side effects
//! - **Failpoints**: `memory-list-page` and `memory-copy` (with the
//!   `failpoints` feature) inject backend failures
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use registry_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new("registry");
//!
//!     backend.put("providers/acme/signing-keys.json", Bytes::from("{}")).await.unwrap();
//!     let body = backend.get("providers/acme/signing-keys.json").await.unwrap();
//!
//!     assert_eq!(body.as_ref(), b"{}");
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - Presigned URLs use a `memory://` scheme and cannot be fetched

use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use bytes::Bytes;
use fail::fail_point;
use parking_lot::RwLock;

use crate::{
    backend::{ListPage, StorageBackend},
    error::{StorageError, StorageResult},
};

/// Default number of keys per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// In-memory object store.
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same objects and counters.
#[derive(Clone)]
pub struct MemoryBackend {
    bucket: String,
    page_size: usize,
    objects: Arc<RwLock<BTreeMap<String, Bytes>>>,
    puts: Arc<AtomicUsize>,
    copies: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("bucket", &self.bucket)
            .field("page_size", &self.page_size)
            .field("objects", &self.objects.read().len())
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    /// Creates an empty store for `bucket` with the default page size.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self::with_page_size(bucket, DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty store whose listings return at most `page_size` keys
    /// per page (minimum 1).
    #[must_use]
    pub fn with_page_size(bucket: impl Into<String>, page_size: usize) -> Self {
        Self {
            bucket: bucket.into(),
            page_size: page_size.max(1),
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            puts: Arc::new(AtomicUsize::new(0)),
            copies: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the bucket name used in presigned URLs.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns a snapshot of every key, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Number of successful `put` calls.
    #[must_use]
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }

    /// Number of successful `copy` calls.
    #[must_use]
    pub fn copy_count(&self) -> usize {
        self.copies.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    #[tracing::instrument(skip(self))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().contains_key(key))
    }

    #[tracing::instrument(skip(self))]
    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
    ) -> StorageResult<ListPage> {
        fail_point!("memory-list-page", |_| {
            Err(StorageError::backend("list", prefix, "injected list failure"))
        });

        let objects = self.objects.read();
        let start = match &continuation {
            Some(after) => Bound::Excluded(after.as_str()),
            None => Bound::Included(prefix),
        };

        let mut keys: Vec<String> = objects
            .range::<str, _>((start, Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .take(self.page_size + 1)
            .cloned()
            .collect();

        // One key past the page tells us whether another page exists.
        let continuation = if keys.len() > self.page_size {
            keys.truncate(self.page_size);
            keys.last().cloned()
        } else {
            None
        };

        Ok(ListPage { keys, continuation })
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.objects.read().get(key).cloned().ok_or_else(|| StorageError::not_found(key))
    }

    #[tracing::instrument(skip(self, body), fields(size = body.len()))]
    async fn put(&self, key: &str, body: Bytes) -> StorageResult<()> {
        self.objects.write().insert(key.to_owned(), body);
        self.puts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn copy(&self, source: &str, destination: &str) -> StorageResult<()> {
        fail_point!("memory-copy", |_| {
            Err(StorageError::backend("copy", source, "injected copy failure"))
        });

        let mut objects = self.objects.write();
        let body = objects.get(source).cloned().ok_or_else(|| StorageError::not_found(source))?;
        objects.insert(destination.to_owned(), body);
        self.copies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn presign(&self, key: &str, expiry: Duration) -> StorageResult<String> {
        let expires_at = SystemTime::now()
            .checked_add(expiry)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .ok_or_else(|| StorageError::backend("presign", key, "cannot compute expiry"))?;

        Ok(format!("memory://{}/{key}?expires={}", self.bucket, expires_at.as_secs()))
    }
}
