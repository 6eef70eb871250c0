//! Integration tests against a real S3-compatible store.
//!
//! Skipped unless `RUN_S3_INTEGRATION_TESTS` is set. The bucket must exist
//! and be empty before the run. A local MinIO works:
//!
//! ```bash
//! docker run -d -p 9000:9000 -e MINIO_ROOT_USER=minio -e MINIO_ROOT_PASSWORD=minio123 \
//!     minio/minio server /data
//! export AWS_ACCESS_KEY_ID=minio AWS_SECRET_ACCESS_KEY=minio123
//! export S3_ENDPOINT=http://localhost:9000 S3_BUCKET=registry-test
//! RUN_S3_INTEGRATION_TESTS=1 cargo test -p registry-storage-s3 --test s3_integration
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{
    env,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use registry_storage::{
    RegistryConfig, RegistryStorage, RequestContext, StorageBackend, StorageError, conformance,
    testutil::publish_provider,
};
use registry_storage_s3::{S3Backend, S3BackendConfig};

// ============================================================================
// Test Configuration
// ============================================================================

static PREFIX_COUNTER: AtomicU64 = AtomicU64::new(0);

fn should_run() -> bool {
    env::var("RUN_S3_INTEGRATION_TESTS").is_ok()
}

fn bucket() -> String {
    env::var("S3_BUCKET").unwrap_or_else(|_| "registry-test".to_string())
}

/// A registry prefix no other test run has used.
fn unique_prefix() -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    format!("it-{nanos}-{}", PREFIX_COUNTER.fetch_add(1, Ordering::Relaxed))
}

async fn create_test_backend() -> S3Backend {
    let endpoint = env::var("S3_ENDPOINT").ok();
    let config = S3BackendConfig::builder()
        .bucket(bucket())
        .region(env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()))
        .maybe_endpoint(endpoint.clone())
        .force_path_style(endpoint.is_some())
        .build()
        .expect("valid S3 config");
    S3Backend::new(config).await.expect("S3 backend")
}

// ============================================================================
// Backend contract
// ============================================================================

#[tokio::test]
async fn test_real_s3_conformance() {
    if !should_run() {
        eprintln!("Skipping real S3 test (RUN_S3_INTEGRATION_TESTS not set)");
        return;
    }

    let backend = create_test_backend().await;
    conformance::run_all(|| backend.clone()).await;
}

#[tokio::test]
async fn test_real_s3_missing_bucket_is_an_error() {
    if !should_run() {
        eprintln!("Skipping real S3 test (RUN_S3_INTEGRATION_TESTS not set)");
        return;
    }

    let backend = create_test_backend().await;
    let absent = S3Backend::from_client(backend.client().clone(), format!("{}-absent", bucket()));

    let result = absent.put("anything", Bytes::from("x")).await;
    assert!(result.is_err(), "put into a missing bucket should fail: {result:?}");

    // NoSuchBucket is a backend failure, not an absent object.
    let result = absent.get("anything").await;
    assert!(matches!(result, Err(StorageError::Backend { .. })), "got: {result:?}");
}

#[tokio::test]
async fn test_real_s3_region_is_discovered_from_bucket() {
    if !should_run() || env::var("S3_ENDPOINT").is_ok() {
        eprintln!("Skipping real S3 test (needs RUN_S3_INTEGRATION_TESTS against AWS)");
        return;
    }
    if env::var("AWS_REGION").is_ok() || env::var("AWS_DEFAULT_REGION").is_ok() {
        eprintln!("Skipping region discovery test (a region is set in the environment)");
        return;
    }

    let config = S3BackendConfig::builder().bucket(bucket()).build().unwrap();
    let backend = S3Backend::new(config).await.expect("region should be discovered");
    assert!(backend.client().config().region().is_some());
    assert!(!backend.exists("nothing-here").await.unwrap());
}

// ============================================================================
// Registry facade
// ============================================================================

#[tokio::test]
async fn test_real_s3_module_lifecycle() {
    if !should_run() {
        eprintln!("Skipping real S3 test (RUN_S3_INTEGRATION_TESTS not set)");
        return;
    }

    let backend = Arc::new(create_test_backend().await);
    let config = RegistryConfig::builder().prefix(unique_prefix()).build().unwrap();
    let storage = RegistryStorage::new(backend, &config);
    let ctx = RequestContext::background();

    let module = storage
        .upload_module(&ctx, "acme", "vpc", "aws", "1.0.0", Bytes::from("module"))
        .await
        .unwrap();
    assert!(module.download_url.contains("vpc.tar.gz"), "url: {}", module.download_url);

    let again = storage.upload_module(&ctx, "acme", "vpc", "aws", "1.0.0", Bytes::new()).await;
    assert!(matches!(again, Err(StorageError::AlreadyExists { .. })), "got: {again:?}");

    storage.upload_module(&ctx, "acme", "vpc", "aws", "1.10.0", Bytes::new()).await.unwrap();
    let versions: Vec<String> = storage
        .list_module_versions(&ctx, "acme", "vpc", "aws")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.version)
        .collect();
    assert_eq!(versions, ["1.0.0", "1.10.0"]);
}

#[tokio::test]
async fn test_real_s3_provider_release() {
    if !should_run() {
        eprintln!("Skipping real S3 test (RUN_S3_INTEGRATION_TESTS not set)");
        return;
    }

    let backend = Arc::new(create_test_backend().await);
    let config = RegistryConfig::builder().prefix(unique_prefix()).build().unwrap();
    let storage = RegistryStorage::new(backend, &config);
    let ctx = RequestContext::background();

    publish_provider(&storage, &ctx, "acme", "foo", "2.0.0", &[("linux", "amd64"), ("darwin", "arm64")])
        .await
        .unwrap();

    let provider =
        storage.get_provider(&ctx, "acme", "foo", "2.0.0", "linux", "amd64").await.unwrap();
    assert_eq!(provider.filename, "terraform-provider-foo_2.0.0_linux_amd64.zip");
    assert_eq!(provider.signing_keys.gpg_public_keys.len(), 1);

    let versions = storage.list_provider_versions(&ctx, "acme", "foo").await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].platforms.len(), 2);

    let digest =
        storage.verify_provider_archive(&ctx, "acme", "foo", "2.0.0", "linux", "amd64").await.unwrap();
    assert_eq!(digest, provider.shasum);
}
