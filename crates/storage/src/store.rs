//! Collaborator traits consumed by the registry API and the migration tool.
//!
//! The HTTP layer depends on [`ModuleStorage`] and [`ProviderStorage`]; the
//! operator tool depends on [`MigrationStorage`]. [`RegistryStorage`]
//! implements all three, and tests may substitute their own implementations.
//!
//! # Usage
//!
//! ```no_run
//! use registry_storage::{Module, ModuleStorage, RequestContext, StorageResult};
//!
//! async fn latest<S: ModuleStorage>(store: &S) -> StorageResult<Option<Module>> {
//!     let ctx = RequestContext::background();
//!     let mut versions = store.list_module_versions(&ctx, "acme", "vpc", "aws").await?;
//!     Ok(versions.pop())
//! }
//! ```
//!
//! [`RegistryStorage`]: crate::RegistryStorage

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    context::RequestContext,
    error::StorageResult,
    migration::{MigrationReport, MigrationReporter},
    types::{Module, Provider, ProviderVersion, SigningKeys},
};

/// Module operations of the registry protocol.
#[async_trait]
pub trait ModuleStorage: Send + Sync {
    /// Returns a module with a presigned download URL.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ModuleNotFound`](crate::StorageError::ModuleNotFound)
    /// if no archive exists at the coordinate.
    async fn get_module(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        provider: &str,
        version: &str,
    ) -> StorageResult<Module>;

    /// Lists every stored version of a module, oldest first.
    ///
    /// Returns an empty list, not an error, when nothing matches.
    async fn list_module_versions(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        provider: &str,
    ) -> StorageResult<Vec<Module>>;

    /// Stores a new module archive and returns it as read back from storage.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Validation`](crate::StorageError::Validation) if a
    ///   coordinate is empty.
    /// - [`StorageError::AlreadyExists`](crate::StorageError::AlreadyExists)
    ///   if the version was uploaded before.
    async fn upload_module(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        provider: &str,
        version: &str,
        body: Bytes,
    ) -> StorageResult<Module>;
}

/// Provider operations of the registry protocol.
#[async_trait]
pub trait ProviderStorage: Send + Sync {
    /// Returns one platform build of a provider with its presigned URLs,
    /// digest and signing keys.
    async fn get_provider(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        version: &str,
        os: &str,
        arch: &str,
    ) -> StorageResult<Provider>;

    /// Lists every version of a provider with its platforms.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ProviderNotFound`](crate::StorageError::ProviderNotFound)
    /// when no versions exist.
    async fn list_provider_versions(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
    ) -> StorageResult<Vec<ProviderVersion>>;

    /// Stores one release file (archive, manifest or signature).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`](crate::StorageError::AlreadyExists)
    /// if the file was uploaded before.
    async fn upload_provider_release_files(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        filename: &str,
        body: Bytes,
    ) -> StorageResult<()>;

    /// Returns the signing keys of a namespace.
    async fn signing_keys(&self, ctx: &RequestContext, namespace: &str)
    -> StorageResult<SigningKeys>;
}

/// One-shot layout migration driven by an operator.
#[async_trait]
pub trait MigrationStorage: Send + Sync {
    /// Copies legacy module keys to the current layout.
    ///
    /// With `dry_run` set, only reports what would be copied.
    async fn migrate_modules(
        &self,
        ctx: &RequestContext,
        reporter: &dyn MigrationReporter,
        dry_run: bool,
    ) -> StorageResult<MigrationReport>;

    /// Copies legacy provider keys (archives, manifests, signatures and
    /// signing keys) to the current layout.
    async fn migrate_providers(
        &self,
        ctx: &RequestContext,
        reporter: &dyn MigrationReporter,
        dry_run: bool,
    ) -> StorageResult<MigrationReport>;
}
