//! Error types for the S3 storage backend.
//!
//! SDK failures are mapped onto [`StorageError`] here. Only an HTTP 404 for
//! a missing object (`NotFound` / `NoSuchKey`) is treated as "missing". A
//! missing bucket (`NoSuchBucket`) and auth, network and throttling failures
//! stay [`StorageError::Backend`], so a misconfigured bucket never reads as
//! an empty registry.

use aws_sdk_s3::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    presigning::PresigningConfigError,
};
use registry_storage::StorageError;
use thiserror::Error;

/// Result type alias for S3 backend setup.
pub type Result<T> = std::result::Result<T, S3StorageError>;

/// Errors specific to the S3 backend.
#[derive(Debug, Error)]
pub enum S3StorageError {
    /// Invalid backend configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Presigning parameters were rejected by the SDK.
    #[error("Presigning error: {0}")]
    Presign(#[from] PresigningConfigError),
}

impl From<S3StorageError> for StorageError {
    fn from(err: S3StorageError) -> Self {
        match err {
            S3StorageError::Config(message) => StorageError::config(message),
            S3StorageError::Presign(source) => {
                StorageError::backend_with_source("presign", "", source)
            },
        }
    }
}

/// HTTP status of the raw response behind an SDK error, if one was received.
pub(crate) fn http_status<E>(err: &SdkError<E>) -> Option<u16> {
    err.raw_response().map(|response| response.status().as_u16())
}

/// Error code S3 returns when the bucket itself does not exist.
const NO_SUCH_BUCKET: &str = "NoSuchBucket";

/// Returns `true` if the error is the store's "object does not exist".
///
/// `HEAD` responses carry no body, so a missing bucket there is
/// indistinguishable from a missing key.
pub(crate) fn is_not_found<E: ProvideErrorMetadata>(err: &SdkError<E>) -> bool {
    is_missing_object(http_status(err), err.code())
}

/// Classifies a response by status and modeled error code.
pub(crate) fn is_missing_object(status: Option<u16>, code: Option<&str>) -> bool {
    status == Some(404) && code != Some(NO_SUCH_BUCKET)
}

/// Converts an SDK error for `operation` on `key` to a storage error.
pub(crate) fn sdk_error_to_storage_error<E>(
    operation: &'static str,
    key: &str,
    err: SdkError<E>,
) -> StorageError
where
    E: std::error::Error + ProvideErrorMetadata + Send + Sync + 'static,
{
    if is_not_found(&err) {
        return StorageError::not_found(key);
    }
    if let SdkError::TimeoutError(_) = err {
        tracing::warn!(operation, key, "S3 operation timed out");
        return StorageError::Timeout;
    }

    let message = DisplayErrorContext(&err).to_string();
    tracing::warn!(
        operation,
        key,
        status = ?http_status(&err),
        code = ?err.code(),
        %message,
        "S3 operation failed"
    );
    StorageError::Backend {
        operation,
        key: key.to_owned(),
        message,
        source: Some(std::sync::Arc::new(err)),
    }
}
