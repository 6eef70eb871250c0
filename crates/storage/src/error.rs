//! Storage error types and result alias.
//!
//! Every operation in this crate returns [`StorageResult<T>`]. Backends map
//! their SDK errors onto [`StorageError`] so that callers can tell expected,
//! recoverable conditions (a missing module, a duplicate upload) apart from
//! infrastructure failures by variant rather than by message text.
//!
//! # Error Kinds
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | [`StorageError::ModuleNotFound`] | No module archive at the requested coordinate |
//! | [`StorageError::ProviderNotFound`] | No provider versions for a namespace/name |
//! | [`StorageError::SigningKeysNotFound`] | Namespace has no signing keys object |
//! | [`StorageError::NotFound`] | A raw object key does not exist |
//! | [`StorageError::AlreadyExists`] | Upload rejected because the key is taken |
//! | [`StorageError::Validation`] | A required coordinate field is empty or malformed |
//! | [`StorageError::Format`] | Unparsable checksum manifest |
//! | [`StorageError::Decode`] | Signing keys document does not match the expected shape |
//! | [`StorageError::ChecksumMismatch`] | Archive digest differs from the manifest |
//! | [`StorageError::Backend`] | Object store failure, tagged with operation and key |
//! | [`StorageError::ListFailed`] | A page fetch failed partway through a listing |
//!
//! # Example
//!
//! ```
//! use registry_storage::{StorageError, StorageResult};
//!
//! fn lookup(key: &str) -> StorageResult<Vec<u8>> {
//!     Err(StorageError::not_found(key))
//! }
//!
//! assert!(lookup("modules/acme/vpc").unwrap_err().is_not_found());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during registry storage operations.
///
/// Errors preserve their source chain via `#[source]`, so tracing output and
/// error reporters can show the underlying SDK failure.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases. Downstream match expressions
/// must include a wildcard arm.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// No module exists at the requested coordinate.
    #[error("module not found: {namespace}/{name}/{provider}/{version}")]
    ModuleNotFound {
        /// Module namespace.
        namespace: String,
        /// Module name.
        name: String,
        /// Module provider.
        provider: String,
        /// Module version.
        version: String,
    },

    /// No provider versions were found for the namespace and name.
    #[error("no provider versions found for {namespace}/{name}")]
    ProviderNotFound {
        /// Provider namespace.
        namespace: String,
        /// Provider name.
        name: String,
    },

    /// The namespace has no signing keys object.
    #[error("signing keys not found for namespace {namespace}")]
    SigningKeysNotFound {
        /// The namespace that was looked up.
        namespace: String,
    },

    /// A raw object key does not exist in the store.
    #[error("object not found: {key}")]
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// An object already exists at the identity key of an upload.
    #[error("object already exists: {key}")]
    AlreadyExists {
        /// The key that is already taken.
        key: String,
    },

    /// A required coordinate field is missing or malformed.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A checksum manifest could not be parsed.
    #[error("malformed checksum manifest: {message}")]
    Format {
        /// Description of the malformed content.
        message: String,
    },

    /// A stored document did not decode into the expected shape.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
        /// The underlying decoder error.
        #[source]
        source: Option<BoxError>,
    },

    /// A downloaded archive does not match its published digest.
    #[error("checksum mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Archive filename.
        filename: String,
        /// Digest published in the manifest.
        expected: String,
        /// Digest computed over the downloaded bytes.
        actual: String,
    },

    /// The object store failed for a reason other than "not found".
    #[error("backend error during {operation} of {key}: {message}")]
    Backend {
        /// Backend operation (`head`, `get`, `put`, `copy`, `presign`, `list`).
        operation: &'static str,
        /// Key the operation targeted.
        key: String,
        /// Description of the failure.
        message: String,
        /// The underlying SDK error.
        #[source]
        source: Option<BoxError>,
    },

    /// A listing aborted because a page fetch failed.
    #[error("listing {prefix} failed")]
    ListFailed {
        /// The prefix being listed.
        prefix: String,
        /// The page fetch failure.
        #[source]
        source: Box<StorageError>,
    },

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// The caller cancelled the request.
    #[error("operation cancelled")]
    Cancelled,

    /// The request deadline elapsed.
    #[error("operation timeout")]
    Timeout,
}

impl StorageError {
    /// Creates a `ModuleNotFound` error for a module coordinate.
    #[must_use]
    pub fn module_not_found(namespace: &str, name: &str, provider: &str, version: &str) -> Self {
        Self::ModuleNotFound {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            provider: provider.to_owned(),
            version: version.to_owned(),
        }
    }

    /// Creates a `ProviderNotFound` error.
    #[must_use]
    pub fn provider_not_found(namespace: &str, name: &str) -> Self {
        Self::ProviderNotFound { namespace: namespace.to_owned(), name: name.to_owned() }
    }

    /// Creates a `NotFound` error for a raw key.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates an `AlreadyExists` error for a key.
    #[must_use]
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Creates a `Validation` error for a field.
    #[must_use]
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation { field, reason: reason.into() }
    }

    /// Creates a `Format` error.
    #[must_use]
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format { message: message.into() }
    }

    /// Creates a `Decode` error with a source.
    #[must_use]
    pub fn decode_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Decode { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a `Backend` error without a source.
    #[must_use]
    pub fn backend(
        operation: &'static str,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend { operation, key: key.into(), message: message.into(), source: None }
    }

    /// Creates a `Backend` error wrapping an SDK error.
    #[must_use]
    pub fn backend_with_source(
        operation: &'static str,
        key: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            operation,
            key: key.into(),
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Wraps a page-fetch failure into `ListFailed`.
    #[must_use]
    pub fn list_failed(prefix: impl Into<String>, source: StorageError) -> Self {
        Self::ListFailed { prefix: prefix.into(), source: Box::new(source) }
    }

    /// Creates a `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Returns `true` for every "does not exist" condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ModuleNotFound { .. }
                | Self::ProviderNotFound { .. }
                | Self::SigningKeysNotFound { .. }
                | Self::NotFound { .. }
        )
    }

    /// Returns `true` if an upload was rejected because the key is taken.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_family() {
        assert!(StorageError::not_found("k").is_not_found());
        assert!(StorageError::module_not_found("a", "b", "c", "1.0.0").is_not_found());
        assert!(StorageError::provider_not_found("a", "b").is_not_found());
        assert!(StorageError::SigningKeysNotFound { namespace: "a".into() }.is_not_found());
        assert!(!StorageError::already_exists("k").is_not_found());
        assert!(!StorageError::backend("head", "k", "denied").is_not_found());
    }

    #[test]
    fn test_list_failed_keeps_source() {
        let err = StorageError::list_failed("modules/", StorageError::Timeout);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("operation timeout"));
    }

    #[test]
    fn test_backend_with_source_message() {
        let io = std::io::Error::other("connection reset");
        let err = StorageError::backend_with_source("get", "providers/x", io);
        assert_eq!(
            err.to_string(),
            "backend error during get of providers/x: connection reset"
        );
    }
}
