//! Storage engine for a Terraform-compatible module and provider registry.
//!
//! Registry state lives entirely in an object store: a module version is one
//! archive object, a provider version is a set of per-platform archives plus a
//! `SHA256SUMS` manifest and its signature, and each namespace has one signing
//! keys document. Entities are rebuilt from object keys on every request and
//! download URLs are presigned at read time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │             Registry API / migration operator tool          │
//! │      ModuleStorage │ ProviderStorage │ MigrationStorage     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      RegistryStorage                        │
//! │   KeyScheme │ checksum │ SigningKeyStore │ VersionCollection│
//! ├─────────────────────────────────────────────────────────────┤
//! │                     StorageBackend trait                    │
//! │      (exists, list, get, put, copy, presign)                │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryBackend│        S3Backend (in `registry-storage-s3`)  │
//! │   (testing)  │            (production)                      │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use registry_storage::{MemoryBackend, RegistryConfig, RegistryStorage, RequestContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RegistryConfig::builder().prefix("registry").build()?;
//!     let storage = RegistryStorage::new(Arc::new(MemoryBackend::new("bucket")), &config);
//!     let ctx = RequestContext::background();
//!
//!     storage.upload_module(&ctx, "acme", "vpc", "aws", "1.0.0", Bytes::from("tgz")).await?;
//!
//!     let versions = storage.list_module_versions(&ctx, "acme", "vpc", "aws").await?;
//!     assert_eq!(versions.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! # Available Backends
//!
//! | Backend | Use Case | Persistence |
//! |---------|----------|-------------|
//! | [`MemoryBackend`] | Testing, development | No |
//! | `S3Backend` (in `registry-storage-s3`) | Production | Yes |
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the [`conformance`](crate::conformance) suite and the `testutil`
//!   module (fixtures, assertion macros). Enable this in `[dev-dependencies]` of backend crates.
//! - **`failpoints`**: Activates the `fail` points in [`MemoryBackend`].

#![deny(unsafe_code)]

pub mod backend;
pub mod checksum;
pub mod collection;
pub mod config;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod conformance;
pub mod context;
pub mod error;
pub mod keys;
pub mod memory;
pub mod migration;
pub mod registry;
pub mod signing_keys;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::{KeyPager, ListPage, StorageBackend};
pub use checksum::{find_digest, sha256_hex, verify_sha256};
pub use collection::{ProviderVersionCollection, compare_versions};
pub use config::{DEFAULT_SIGNED_URL_EXPIRY, MAX_SIGNED_URL_EXPIRY, RegistryConfig};
pub use context::RequestContext;
pub use error::{BoxError, StorageError, StorageResult};
pub use keys::{KeyScheme, ModuleCoordinates, ProviderArchive, ProviderReleaseKeys};
pub use memory::MemoryBackend;
pub use migration::{
    MigrationEvent, MigrationReport, MigrationReporter, RecordingReporter, TracingReporter,
};
pub use registry::RegistryStorage;
pub use signing_keys::{SigningKeyStore, decode_signing_keys};
pub use store::{MigrationStorage, ModuleStorage, ProviderStorage};
pub use types::{GpgPublicKey, Module, Platform, Provider, ProviderVersion, SigningKeys};
