//! Per-request cancellation and deadlines.
//!
//! Every registry operation takes a [`RequestContext`]. Network calls made on
//! behalf of the request are raced against the context's cancellation token
//! and deadline; when either fires, the in-flight backend future is dropped
//! and the operation fails with [`StorageError::Cancelled`] or
//! [`StorageError::Timeout`].
//!
//! Dropping a backend future aborts its request. Backends perform whole-object
//! writes, so an aborted `put` never leaves a partial object behind.

use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{StorageError, StorageResult};

/// Cancellation token plus optional deadline for one request.
///
/// Cloning shares the token: cancelling any clone cancels all of them.
/// Use [`child`](Self::child) for a context that can be cancelled on its own.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use registry_storage::RequestContext;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let ctx = RequestContext::background().with_timeout(Duration::from_secs(5));
/// let value = ctx.run(async { Ok(42) }).await.unwrap();
/// assert_eq!(value, 42);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Wraps an existing cancellation token.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token, deadline: None }
    }

    /// Returns a copy whose deadline is `timeout` from now, or the current
    /// deadline if that is earlier.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self { token: self.token.clone(), deadline: Some(deadline) }
    }

    /// Returns a context that is cancelled when this one is, but can also be
    /// cancelled independently.
    #[must_use]
    pub fn child(&self) -> Self {
        Self { token: self.token.child_token(), deadline: self.deadline }
    }

    /// Cancels this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Runs `future` to completion unless the context is cancelled or its
    /// deadline passes first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Cancelled`] or [`StorageError::Timeout`] when
    /// the request is abandoned, otherwise the future's own result.
    pub async fn run<T, F>(&self, future: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        if self.token.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    () = self.token.cancelled() => Err(StorageError::Cancelled),
                    () = tokio::time::sleep_until(deadline) => Err(StorageError::Timeout),
                    result = future => result,
                }
            },
            None => {
                tokio::select! {
                    biased;
                    () = self.token.cancelled() => Err(StorageError::Cancelled),
                    result = future => result,
                }
            },
        }
    }
}
