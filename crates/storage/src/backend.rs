//! Object store backend trait.
//!
//! [`StorageBackend`] is the capability set the registry needs from an object
//! store: existence checks, paginated listing, whole-object reads and writes,
//! server-side copy and presigned download URLs. The registry facade and the
//! migration code are written against this trait only, so S3-compatible
//! stores, other cloud stores and the in-memory test backend are
//! interchangeable.
//!
//! # Implementing a Backend
//!
//! 1. Implement [`StorageBackend`], returning [`ListPage`]s with an opaque continuation token.
//! 2. Map the store's "object does not exist" status to `Ok(false)` in
//!    [`exists`](StorageBackend::exists) and to [`StorageError::NotFound`] in
//!    [`get`](StorageBackend::get); every other failure is a [`StorageError::Backend`].
//! 3. Run the [`conformance`](crate::conformance) suite against it.
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{StorageError, StorageResult};

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys on this page, in the store's listing order.
    pub keys: Vec<String>,
    /// Token for the next page, `None` on the last page.
    pub continuation: Option<String>,
}

/// Abstract object store used by the registry.
///
/// Implementations must be `Send + Sync`; every method may be called
/// concurrently from many tasks.
///
/// # Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`exists`](StorageBackend::exists) | Check whether a key exists |
/// | [`list_page`](StorageBackend::list_page) | Fetch one page of keys under a prefix |
/// | [`list`](StorageBackend::list) | All keys under a prefix, across pages |
/// | [`get`](StorageBackend::get) | Read a whole object |
/// | [`put`](StorageBackend::put) | Write a whole object |
/// | [`copy`](StorageBackend::copy) | Server-side copy between keys |
/// | [`presign`](StorageBackend::presign) | Time-limited download URL |
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use registry_storage::{MemoryBackend, StorageBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new("registry");
///
/// backend.put("modules/acme/vpc/aws/1.0.0/vpc.tar.gz", Bytes::from("archive")).await.unwrap();
/// assert!(backend.exists("modules/acme/vpc/aws/1.0.0/vpc.tar.gz").await.unwrap());
/// assert_eq!(backend.list("modules/").await.unwrap().len(), 1);
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Checks whether an object exists.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the object exists
    /// - `Ok(false)` if the store reports "not found"
    /// - `Err(...)` for any other failure (auth, network, malformed request)
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Fetches one page of keys starting with `prefix`.
    ///
    /// Pass `None` for the first page and the previous page's
    /// [`continuation`](ListPage::continuation) for the following ones.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn list_page(&self, prefix: &str, continuation: Option<String>)
    -> StorageResult<ListPage>;

    /// Lists every key starting with `prefix`, fetching pages sequentially.
    ///
    /// Callers never see continuation tokens. A failure on any page aborts
    /// the whole listing with [`StorageError::ListFailed`]; partial results
    /// are never returned.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut pager = KeyPager::new(self, prefix);
        let mut keys = Vec::new();
        while let Some(page) = pager.next_page().await? {
            keys.extend(page);
        }
        Ok(keys)
    }

    /// Reads a whole object.
    ///
    /// Returns [`StorageError::NotFound`] if the object does not exist.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Writes a whole object, replacing any existing one.
    ///
    /// The write is atomic: on failure or cancellation no partial object is
    /// visible at `key`.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn put(&self, key: &str, body: Bytes) -> StorageResult<()>;

    /// Copies `source` to `destination` inside the store, leaving `source`
    /// in place.
    ///
    /// Returns [`StorageError::NotFound`] if `source` does not exist.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn copy(&self, source: &str, destination: &str) -> StorageResult<()>;

    /// Returns a credential-free download URL for `key`, valid for `expiry`
    /// from now.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn presign(&self, key: &str, expiry: Duration) -> StorageResult<String>;
}

/// Lazily walks the pages of a listing.
///
/// Each call to [`next_page`](KeyPager::next_page) performs one round trip.
/// Page-fetch failures are wrapped in [`StorageError::ListFailed`], and the
/// pager is exhausted afterwards.
pub struct KeyPager<'a, B: StorageBackend + ?Sized> {
    backend: &'a B,
    prefix: String,
    continuation: Option<String>,
    done: bool,
}

impl<'a, B: StorageBackend + ?Sized> KeyPager<'a, B> {
    /// Starts a listing of `prefix`.
    pub fn new(backend: &'a B, prefix: &str) -> Self {
        Self { backend, prefix: prefix.to_owned(), continuation: None, done: false }
    }

    /// Fetches the next page, or `None` once the listing is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ListFailed`] if the page fetch fails.
    pub async fn next_page(&mut self) -> StorageResult<Option<Vec<String>>> {
        if self.done {
            return Ok(None);
        }
        let page = match self.backend.list_page(&self.prefix, self.continuation.take()).await {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                tracing::warn!(prefix = %self.prefix, error = %e, "listing page fetch failed");
                return Err(StorageError::list_failed(self.prefix.clone(), e));
            },
        };
        match page.continuation {
            Some(token) => self.continuation = Some(token),
            None => self.done = true,
        }
        Ok(Some(page.keys))
    }
}
