//! The registry storage facade.
//!
//! [`RegistryStorage`] composes the key scheme, checksum parser, signing key
//! store and version collection over any [`StorageBackend`]. It holds no
//! mutable state: every call reconstructs entities from object keys, so one
//! instance can serve any number of concurrent requests.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use registry_storage::{MemoryBackend, RegistryConfig, RegistryStorage, RequestContext};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let storage = RegistryStorage::new(
//!     Arc::new(MemoryBackend::new("registry")),
//!     &RegistryConfig::default(),
//! );
//! let ctx = RequestContext::background();
//!
//! storage.upload_module(&ctx, "acme", "vpc", "aws", "1.0.0", Bytes::from("archive")).await.unwrap();
//! let module = storage.get_module(&ctx, "acme", "vpc", "aws", "1.0.0").await.unwrap();
//! assert!(module.download_url.contains("modules/acme/vpc/aws/1.0.0/vpc.tar.gz"));
//! # });
//! ```

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    backend::StorageBackend,
    checksum::{find_digest, verify_sha256},
    collection::{ProviderVersionCollection, compare_versions},
    config::RegistryConfig,
    context::RequestContext,
    error::{StorageError, StorageResult},
    keys::{KeyScheme, archive_filename},
    signing_keys::SigningKeyStore,
    store::{ModuleStorage, ProviderStorage},
    types::{Module, Provider, ProviderVersion, SigningKeys},
};

/// Module and provider storage over an object store.
pub struct RegistryStorage<B: StorageBackend + ?Sized> {
    backend: Arc<B>,
    keys: KeyScheme,
    signed_url_expiry: Duration,
    signing_keys: SigningKeyStore<B>,
}

impl<B: StorageBackend + ?Sized> Clone for RegistryStorage<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            keys: self.keys.clone(),
            signed_url_expiry: self.signed_url_expiry,
            signing_keys: self.signing_keys.clone(),
        }
    }
}

impl<B: StorageBackend + ?Sized> std::fmt::Debug for RegistryStorage<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryStorage")
            .field("keys", &self.keys)
            .field("signed_url_expiry", &self.signed_url_expiry)
            .finish_non_exhaustive()
    }
}

impl<B: StorageBackend + ?Sized> RegistryStorage<B> {
    /// Creates a facade over `backend` with the settings in `config`.
    pub fn new(backend: Arc<B>, config: &RegistryConfig) -> Self {
        let keys = config.key_scheme();
        Self {
            signing_keys: SigningKeyStore::new(Arc::clone(&backend), keys.clone()),
            backend,
            keys,
            signed_url_expiry: config.signed_url_expiry(),
        }
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Returns the key scheme in use.
    #[must_use]
    pub fn key_scheme(&self) -> &KeyScheme {
        &self.keys
    }

    /// Returns the signing key store.
    #[must_use]
    pub fn signing_key_store(&self) -> &SigningKeyStore<B> {
        &self.signing_keys
    }

    async fn presign(&self, ctx: &RequestContext, key: &str) -> StorageResult<String> {
        ctx.run(self.backend.presign(key, self.signed_url_expiry)).await
    }

    /// Returns a module with a presigned download URL.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Validation`] if a coordinate is empty or contains `/`.
    /// - [`StorageError::ModuleNotFound`] if no archive exists.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn get_module(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        provider: &str,
        version: &str,
    ) -> StorageResult<Module> {
        let key = self.keys.module_key(namespace, name, provider, version)?;
        if !ctx.run(self.backend.exists(&key)).await? {
            return Err(StorageError::module_not_found(namespace, name, provider, version));
        }
        let download_url = self.presign(ctx, &key).await?;
        Ok(Module {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            provider: provider.to_owned(),
            version: version.to_owned(),
            download_url,
        })
    }

    /// Lists every stored version of a module, oldest first.
    ///
    /// Keys under the module's prefix that do not parse as module archives
    /// are skipped. No matches yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ListFailed`] if a page fetch fails.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn list_module_versions(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        provider: &str,
    ) -> StorageResult<Vec<Module>> {
        let prefix = self.keys.module_prefix(namespace, name, provider)?;
        let keys = ctx.run(self.backend.list(&prefix)).await?;

        let mut modules = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(coordinates) = self.keys.parse_module_key(&key) else {
                tracing::debug!(%key, "skipping non-module key");
                continue;
            };
            let download_url = self.presign(ctx, &key).await?;
            modules.push(Module {
                namespace: coordinates.namespace,
                name: coordinates.name,
                provider: coordinates.provider,
                version: coordinates.version,
                download_url,
            });
        }
        modules.sort_by(|a, b| compare_versions(&a.version, &b.version));
        Ok(modules)
    }

    /// Stores a new module archive, then reads it back.
    ///
    /// Existence is checked before writing; two concurrent uploads of the
    /// same coordinate can both pass the check.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Validation`] if a coordinate is empty or contains `/`.
    /// - [`StorageError::AlreadyExists`] if the version was uploaded before.
    #[tracing::instrument(skip(self, ctx, body), fields(size = body.len()))]
    pub async fn upload_module(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        provider: &str,
        version: &str,
        body: Bytes,
    ) -> StorageResult<Module> {
        let key = self.keys.module_key(namespace, name, provider, version)?;
        if ctx.run(self.backend.exists(&key)).await? {
            return Err(StorageError::already_exists(key));
        }
        ctx.run(self.backend.put(&key, body)).await?;
        tracing::info!(%key, "module uploaded");
        self.get_module(ctx, namespace, name, provider, version).await
    }

    /// Returns one platform build of a provider.
    ///
    /// Presigns the archive, manifest and signature, reads the archive's
    /// digest from the manifest and loads the namespace's signing keys. The
    /// first failing step aborts the call.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if the manifest is missing or has no entry
    ///   for the archive.
    /// - [`StorageError::Format`] if the manifest is malformed.
    /// - [`StorageError::SigningKeysNotFound`] if the namespace has no keys.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn get_provider(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        version: &str,
        os: &str,
        arch: &str,
    ) -> StorageResult<Provider> {
        let release = self.keys.provider_release_keys(namespace, name, version, os, arch)?;
        let filename = archive_filename(name, version, os, arch);

        let download_url = self.presign(ctx, &release.archive).await?;
        let shasums_url = self.presign(ctx, &release.shasums).await?;
        let shasums_signature_url = self.presign(ctx, &release.signature).await?;

        let manifest = ctx.run(self.backend.get(&release.shasums)).await?;
        let shasum = find_digest(&manifest, &filename)?;
        let signing_keys = self.signing_keys.load(ctx, namespace).await?;

        Ok(Provider {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            version: version.to_owned(),
            os: os.to_owned(),
            arch: arch.to_owned(),
            filename,
            shasum,
            download_url,
            shasums_url,
            shasums_signature_url,
            signing_keys,
        })
    }

    /// Lists every version of a provider with its platforms.
    ///
    /// # Errors
    ///
    /// - [`StorageError::ProviderNotFound`] if no archive keys are found.
    /// - [`StorageError::ListFailed`] if a page fetch fails.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn list_provider_versions(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
    ) -> StorageResult<Vec<ProviderVersion>> {
        let prefix = self.keys.provider_prefix(namespace, name)?;
        let keys = ctx.run(self.backend.list(&prefix)).await?;

        let mut collection = ProviderVersionCollection::new();
        for key in &keys {
            match self.keys.parse_provider_key(key) {
                Some(archive) => collection.add_archive(&archive),
                None => tracing::debug!(%key, "skipping non-archive key"),
            }
        }

        if collection.is_empty() {
            return Err(StorageError::provider_not_found(namespace, name));
        }
        Ok(collection.list())
    }

    /// Stores one provider release file.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Validation`] if a field is empty or contains `/`.
    /// - [`StorageError::AlreadyExists`] if the file was uploaded before.
    #[tracing::instrument(skip(self, ctx, body), fields(size = body.len()))]
    pub async fn upload_provider_release_files(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        filename: &str,
        body: Bytes,
    ) -> StorageResult<()> {
        let key = self.keys.provider_key(namespace, name, filename)?;
        if ctx.run(self.backend.exists(&key)).await? {
            return Err(StorageError::already_exists(key));
        }
        ctx.run(self.backend.put(&key, body)).await?;
        tracing::info!(%key, "provider release file uploaded");
        Ok(())
    }

    /// Returns the signing keys of a namespace.
    ///
    /// # Errors
    ///
    /// - [`StorageError::SigningKeysNotFound`] if the namespace has none.
    /// - [`StorageError::Decode`] if the stored document is malformed.
    pub async fn signing_keys(
        &self,
        ctx: &RequestContext,
        namespace: &str,
    ) -> StorageResult<SigningKeys> {
        self.signing_keys.load(ctx, namespace).await
    }

    /// Downloads a provider archive and checks it against the version's
    /// manifest, returning the verified digest.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if the archive, the manifest, or the
    ///   archive's manifest entry is missing.
    /// - [`StorageError::ChecksumMismatch`] if the digests differ.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn verify_provider_archive(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        version: &str,
        os: &str,
        arch: &str,
    ) -> StorageResult<String> {
        let release = self.keys.provider_release_keys(namespace, name, version, os, arch)?;
        let filename = archive_filename(name, version, os, arch);

        let manifest = ctx.run(self.backend.get(&release.shasums)).await?;
        let expected = find_digest(&manifest, &filename)?;
        let archive = ctx.run(self.backend.get(&release.archive)).await?;

        if let Err(e) = verify_sha256(&filename, &archive, &expected) {
            tracing::warn!(%filename, error = %e, "provider archive failed verification");
            return Err(e);
        }
        Ok(expected)
    }
}

#[async_trait]
impl<B: StorageBackend + ?Sized> ModuleStorage for RegistryStorage<B> {
    async fn get_module(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        provider: &str,
        version: &str,
    ) -> StorageResult<Module> {
        RegistryStorage::get_module(self, ctx, namespace, name, provider, version).await
    }

    async fn list_module_versions(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        provider: &str,
    ) -> StorageResult<Vec<Module>> {
        RegistryStorage::list_module_versions(self, ctx, namespace, name, provider).await
    }

    async fn upload_module(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        provider: &str,
        version: &str,
        body: Bytes,
    ) -> StorageResult<Module> {
        RegistryStorage::upload_module(self, ctx, namespace, name, provider, version, body).await
    }
}

#[async_trait]
impl<B: StorageBackend + ?Sized> ProviderStorage for RegistryStorage<B> {
    async fn get_provider(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        version: &str,
        os: &str,
        arch: &str,
    ) -> StorageResult<Provider> {
        RegistryStorage::get_provider(self, ctx, namespace, name, version, os, arch).await
    }

    async fn list_provider_versions(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
    ) -> StorageResult<Vec<ProviderVersion>> {
        RegistryStorage::list_provider_versions(self, ctx, namespace, name).await
    }

    async fn upload_provider_release_files(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        filename: &str,
        body: Bytes,
    ) -> StorageResult<()> {
        RegistryStorage::upload_provider_release_files(self, ctx, namespace, name, filename, body)
            .await
    }

    async fn signing_keys(
        &self,
        ctx: &RequestContext,
        namespace: &str,
    ) -> StorageResult<SigningKeys> {
        RegistryStorage::signing_keys(self, ctx, namespace).await
    }
}
