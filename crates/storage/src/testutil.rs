//! Shared test utilities for registry storage tests.
//!
//! Fixture builders for manifests, signing keys and legacy keys, a helper
//! that publishes a complete provider release, and assertion macros for
//! [`StorageResult`] values. Feature-gated behind `testutil`.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! registry-storage = { path = "../storage", features = ["testutil"] }
//! ```

use std::sync::Arc;

use bytes::Bytes;

use crate::{
    backend::StorageBackend,
    checksum::sha256_hex,
    config::RegistryConfig,
    context::RequestContext,
    error::{StorageError, StorageResult},
    keys::{PROVIDER_BINARY_PREFIX, archive_filename, shasums_filename},
    memory::MemoryBackend,
    registry::RegistryStorage,
    signing_keys::encode_signing_keys,
    types::{GpgPublicKey, SigningKeys},
};

/// Deterministic archive body for one platform build.
#[must_use]
pub fn archive_body(name: &str, version: &str, os: &str, arch: &str) -> Bytes {
    Bytes::from(format!("{PROVIDER_BINARY_PREFIX}{name} {version} {os}/{arch}"))
}

/// `SHA256SUMS` manifest covering the archive bodies from [`archive_body`].
#[must_use]
pub fn manifest_for(name: &str, version: &str, platforms: &[(&str, &str)]) -> String {
    platforms
        .iter()
        .map(|(os, arch)| {
            let digest = sha256_hex(&archive_body(name, version, os, arch));
            format!("{digest}  {}\n", archive_filename(name, version, os, arch))
        })
        .collect()
}

/// Signing keys with a single key.
#[must_use]
pub fn sample_signing_keys(key_id: &str) -> SigningKeys {
    SigningKeys {
        gpg_public_keys: vec![GpgPublicKey {
            key_id: key_id.to_owned(),
            ascii_armor: format!(
                "-----BEGIN PGP PUBLIC KEY BLOCK-----\n{key_id}\n-----END PGP PUBLIC KEY BLOCK-----"
            ),
            trust_signature: None,
            source: None,
            source_url: None,
        }],
    }
}

/// Legacy module key (hive-style segments).
#[must_use]
pub fn legacy_module_key(
    prefix: &str,
    namespace: &str,
    name: &str,
    provider: &str,
    version: &str,
    format: &str,
) -> String {
    join(
        prefix,
        &format!(
            "modules/namespace={namespace}/name={name}/provider={provider}/version={version}/{namespace}-{name}-{provider}-{version}.{format}"
        ),
    )
}

/// Legacy provider archive key (hive-style segments).
#[must_use]
pub fn legacy_provider_archive_key(
    prefix: &str,
    namespace: &str,
    name: &str,
    version: &str,
    os: &str,
    arch: &str,
) -> String {
    join(
        prefix,
        &format!(
            "providers/namespace={namespace}/name={name}/version={version}/os={os}/arch={arch}/{}",
            archive_filename(name, version, os, arch)
        ),
    )
}

/// Legacy manifest key (hive-style segments).
#[must_use]
pub fn legacy_shasums_key(prefix: &str, namespace: &str, name: &str, version: &str) -> String {
    join(
        prefix,
        &format!(
            "providers/namespace={namespace}/name={name}/version={version}/{}",
            shasums_filename(name, version)
        ),
    )
}

/// Legacy signing keys key (hive-style segments).
#[must_use]
pub fn legacy_signing_keys_key(prefix: &str, namespace: &str) -> String {
    join(prefix, &format!("providers/namespace={namespace}/signing-keys.json"))
}

fn join(prefix: &str, rest: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() { rest.to_owned() } else { format!("{prefix}/{rest}") }
}

/// Page size of the [`registry`] fixture, small enough that most listings
/// span several pages.
pub const TEST_PAGE_SIZE: usize = 2;

/// A request context with no deadline.
#[must_use]
pub fn ctx() -> RequestContext {
    RequestContext::background()
}

/// Creates a [`MemoryBackend`] and a facade over it with `prefix`.
///
/// # Panics
///
/// Panics if `prefix` produces an invalid configuration.
#[allow(clippy::expect_used)]
pub fn registry(prefix: &str) -> (MemoryBackend, RegistryStorage<MemoryBackend>) {
    let backend = MemoryBackend::with_page_size("test", TEST_PAGE_SIZE);
    let config = RegistryConfig::builder().prefix(prefix).build().expect("valid test config");
    (backend.clone(), RegistryStorage::new(Arc::new(backend), &config))
}

/// Uploads the archives, manifest and signature for one provider version,
/// and the namespace's signing keys if none exist yet.
///
/// # Errors
///
/// Returns the first upload failure.
pub async fn publish_provider<B: StorageBackend + ?Sized>(
    storage: &RegistryStorage<B>,
    ctx: &RequestContext,
    namespace: &str,
    name: &str,
    version: &str,
    platforms: &[(&str, &str)],
) -> StorageResult<()> {
    for (os, arch) in platforms {
        storage
            .upload_provider_release_files(
                ctx,
                namespace,
                name,
                &archive_filename(name, version, os, arch),
                archive_body(name, version, os, arch),
            )
            .await?;
    }

    let shasums = shasums_filename(name, version);
    storage
        .upload_provider_release_files(
            ctx,
            namespace,
            name,
            &shasums,
            Bytes::from(manifest_for(name, version, platforms)),
        )
        .await?;
    storage
        .upload_provider_release_files(
            ctx,
            namespace,
            name,
            &format!("{shasums}.sig"),
            Bytes::from_static(b"signature"),
        )
        .await?;

    let keys_key = storage.key_scheme().signing_keys_key(namespace)?;
    if !storage.backend().exists(&keys_key).await? {
        let body = encode_signing_keys(&sample_signing_keys("51852D87348FFC4C"))?;
        storage.backend().put(&keys_key, body).await?;
    }
    Ok(())
}

/// Assert that a [`StorageResult`] is a "does not exist" error
/// ([`StorageError::is_not_found`]).
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use registry_storage::{StorageError, StorageResult, assert_not_found};
///
/// let result: StorageResult<()> = Err(StorageError::not_found("missing"));
/// assert_not_found!(result);
/// ```
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        match &$result {
            Err(e) if e.is_not_found() => {},
            other => panic!("expected a not-found error, got: {other:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match &$result {
            Err(e) if e.is_not_found() => {},
            other => panic!("{}: expected a not-found error, got: {other:?}", $msg),
        }
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::AlreadyExists`].
#[macro_export]
macro_rules! assert_already_exists {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::StorageError::AlreadyExists { .. })),
            "expected StorageError::AlreadyExists, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::StorageError::AlreadyExists { .. })),
            "{}: expected StorageError::AlreadyExists, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`, returning the value.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
}

/// Returns `true` if `result` is a validation error for `field`.
pub fn is_validation<T>(result: &StorageResult<T>, field: &str) -> bool {
    matches!(result, Err(StorageError::Validation { field: f, .. }) if *f == field)
}
