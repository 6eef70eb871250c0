//! Per-namespace signing keys.
//!
//! Each namespace that publishes providers stores one JSON document at
//! [`KeyScheme::signing_keys_key`] listing the GPG keys its manifests may be
//! signed with.

use std::sync::Arc;

use bytes::Bytes;

use crate::{
    backend::StorageBackend,
    context::RequestContext,
    error::{StorageError, StorageResult},
    keys::KeyScheme,
    types::SigningKeys,
};

/// Decodes a signing keys document.
///
/// # Errors
///
/// Returns [`StorageError::Decode`] if `bytes` is not JSON of the expected
/// shape.
pub fn decode_signing_keys(bytes: &[u8]) -> StorageResult<SigningKeys> {
    serde_json::from_slice(bytes)
        .map_err(|e| StorageError::decode_with_source("invalid signing keys document", e))
}

/// Encodes a signing keys document.
///
/// # Errors
///
/// Returns [`StorageError::Decode`] if serialization fails.
pub fn encode_signing_keys(keys: &SigningKeys) -> StorageResult<Bytes> {
    serde_json::to_vec(keys)
        .map(Bytes::from)
        .map_err(|e| StorageError::decode_with_source("cannot encode signing keys", e))
}

/// Reads and writes signing keys documents.
pub struct SigningKeyStore<B: StorageBackend + ?Sized> {
    backend: Arc<B>,
    keys: KeyScheme,
}

impl<B: StorageBackend + ?Sized> Clone for SigningKeyStore<B> {
    fn clone(&self) -> Self {
        Self { backend: Arc::clone(&self.backend), keys: self.keys.clone() }
    }
}

impl<B: StorageBackend + ?Sized> SigningKeyStore<B> {
    /// Creates a store over `backend` using `keys` for key construction.
    pub fn new(backend: Arc<B>, keys: KeyScheme) -> Self {
        Self { backend, keys }
    }

    /// Loads the signing keys of `namespace`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Validation`] if `namespace` is empty.
    /// - [`StorageError::SigningKeysNotFound`] if the namespace has no document.
    /// - [`StorageError::Decode`] if the document is malformed.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn load(&self, ctx: &RequestContext, namespace: &str) -> StorageResult<SigningKeys> {
        let key = self.keys.signing_keys_key(namespace)?;
        let body = match ctx.run(self.backend.get(&key)).await {
            Ok(body) => body,
            Err(StorageError::NotFound { .. }) => {
                return Err(StorageError::SigningKeysNotFound { namespace: namespace.to_owned() });
            },
            Err(e) => return Err(e),
        };
        decode_signing_keys(&body)
    }

    /// Replaces the signing keys of `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] if `namespace` is empty, or the
    /// backend error if the write fails.
    #[tracing::instrument(skip(self, ctx, keys), fields(count = keys.gpg_public_keys.len()))]
    pub async fn store(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        keys: &SigningKeys,
    ) -> StorageResult<()> {
        let key = self.keys.signing_keys_key(namespace)?;
        let body = encode_signing_keys(keys)?;
        ctx.run(self.backend.put(&key, body)).await
    }
}
