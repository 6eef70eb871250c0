//! Layout migration tests.
//!
//! Legacy keys use hive-style `field=value` segments. These tests seed a
//! mix of legacy, current and unrelated keys and check dry runs, live runs,
//! idempotent re-runs and abort-on-first-failure.

#![allow(clippy::expect_used, clippy::panic, clippy::unwrap_used)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use registry_storage::{
    ListPage, MemoryBackend, MigrationEvent, MigrationStorage, RecordingReporter, RegistryConfig,
    RegistryStorage, StorageBackend, StorageError, StorageResult, TracingReporter,
    testutil::{
        ctx, legacy_module_key, legacy_provider_archive_key, legacy_signing_keys_key, registry,
    },
};

const LEGACY_MODULES: [&str; 3] = [
    "reg/modules/namespace=acme/name=vpc/provider=aws/version=1.0.0/acme-vpc-aws-1.0.0.tar.gz",
    "reg/modules/namespace=acme/name=vpc/provider=aws/version=1.1.0/acme-vpc-aws-1.1.0.tar.gz",
    "reg/modules/namespace=acme/name=dns/provider=gcp/version=0.3.0/acme-dns-gcp-0.3.0.tar.gz",
];

const LEGACY_PROVIDERS: [&str; 4] = [
    "reg/providers/namespace=acme/name=foo/version=1.0.0/os=linux/arch=amd64/terraform-provider-foo_1.0.0_linux_amd64.zip",
    "reg/providers/namespace=acme/name=foo/version=1.0.0/terraform-provider-foo_1.0.0_SHA256SUMS",
    "reg/providers/namespace=acme/name=foo/version=1.0.0/terraform-provider-foo_1.0.0_SHA256SUMS.sig",
    "reg/providers/namespace=acme/signing-keys.json",
];

async fn seed(backend: &MemoryBackend) {
    for key in LEGACY_MODULES.iter().chain(&LEGACY_PROVIDERS) {
        backend.put(key, Bytes::from(*key)).await.unwrap();
    }
    // Already current, and unrelated objects.
    backend.put("reg/modules/acme/net/aws/2.0.0/net.tar.gz", Bytes::new()).await.unwrap();
    backend.put("reg/modules/README.md", Bytes::new()).await.unwrap();
    backend.put("other/modules/namespace=x/name=y/provider=z/version=1/x-y-z-1.tar.gz", Bytes::new()).await.unwrap();
}

#[tokio::test]
async fn dry_run_reports_every_candidate_and_copies_nothing() {
    let (backend, storage) = registry("reg");
    seed(&backend).await;
    let before = backend.keys();
    let reporter = RecordingReporter::new();

    let modules = storage.migrate_modules(&ctx(), &reporter, true).await.unwrap();
    let providers = storage.migrate_providers(&ctx(), &reporter, true).await.unwrap();

    assert_eq!(modules.candidates, LEGACY_MODULES.len());
    assert_eq!(providers.candidates, LEGACY_PROVIDERS.len());
    assert_eq!(modules.copied + providers.copied, 0);
    assert_eq!(backend.copy_count(), 0);
    assert_eq!(backend.keys(), before);

    let mut reported = reporter.candidates();
    reported.sort();
    let mut expected: Vec<String> =
        LEGACY_MODULES.iter().chain(&LEGACY_PROVIDERS).map(ToString::to_string).collect();
    expected.sort();
    assert_eq!(reported, expected);
    assert!(reporter.events().iter().all(|e| matches!(e, MigrationEvent::Planned { .. })));
}

#[tokio::test]
async fn live_run_copies_to_current_layout() {
    let (backend, storage) = registry("reg");
    seed(&backend).await;

    storage.migrate_modules(&ctx(), &TracingReporter, false).await.unwrap();
    storage.migrate_providers(&ctx(), &TracingReporter, false).await.unwrap();

    for (legacy, current) in [
        (LEGACY_MODULES[0], "reg/modules/acme/vpc/aws/1.0.0/vpc.tar.gz"),
        (LEGACY_MODULES[2], "reg/modules/acme/dns/gcp/0.3.0/dns.tar.gz"),
        (LEGACY_PROVIDERS[0], "reg/providers/acme/foo/terraform-provider-foo_1.0.0_linux_amd64.zip"),
        (LEGACY_PROVIDERS[2], "reg/providers/acme/foo/terraform-provider-foo_1.0.0_SHA256SUMS.sig"),
        (LEGACY_PROVIDERS[3], "reg/providers/acme/signing-keys.json"),
    ] {
        assert_eq!(backend.get(current).await.unwrap(), Bytes::from(legacy), "target of {legacy}");
        assert!(backend.exists(legacy).await.unwrap(), "legacy key {legacy} must stay in place");
    }
    assert_eq!(backend.copy_count(), LEGACY_MODULES.len() + LEGACY_PROVIDERS.len());

    // Migrated data is served by the facade.
    let modules = storage.list_module_versions(&ctx(), "acme", "vpc", "aws").await.unwrap();
    assert_eq!(modules.len(), 2);
    let versions = storage.list_provider_versions(&ctx(), "acme", "foo").await.unwrap();
    assert_eq!(versions[0].version, "1.0.0");
}

#[tokio::test]
async fn second_run_touches_nothing() {
    let (backend, storage) = registry("reg");
    seed(&backend).await;
    storage.migrate_modules(&ctx(), &TracingReporter, false).await.unwrap();
    let copies = backend.copy_count();

    let reporter = RecordingReporter::new();
    let report = storage.migrate_modules(&ctx(), &reporter, false).await.unwrap();

    assert_eq!(report.candidates, 0);
    assert_eq!(report.copied, 0);
    assert_eq!(report.already_migrated, LEGACY_MODULES.len());
    assert_eq!(backend.copy_count(), copies);
    assert!(reporter.candidates().is_empty());
}

#[tokio::test]
async fn partial_migration_resumes_with_remaining_keys() {
    let (backend, storage) = registry("reg");
    seed(&backend).await;
    // Pretend the first module was migrated by an earlier, interrupted run.
    backend.copy(LEGACY_MODULES[0], "reg/modules/acme/vpc/aws/1.0.0/vpc.tar.gz").await.unwrap();

    let reporter = RecordingReporter::new();
    let report = storage.migrate_modules(&ctx(), &reporter, false).await.unwrap();

    assert_eq!(report.copied, 2);
    assert_eq!(report.already_migrated, 1);
    assert!(!reporter.candidates().contains(&LEGACY_MODULES[0].to_owned()));
}

#[tokio::test]
async fn usable_through_migration_trait_object() {
    let (backend, storage) = registry("reg");
    seed(&backend).await;
    let migrator: Arc<dyn MigrationStorage> = Arc::new(storage);

    let report = migrator.migrate_providers(&ctx(), &TracingReporter, true).await.unwrap();
    assert_eq!(report.candidates, LEGACY_PROVIDERS.len());
}

#[tokio::test]
async fn hive_shaped_module_coordinates_are_rejected_on_upload() {
    let (backend, storage) = registry("reg");
    let err = storage
        .upload_module(&ctx(), "namespace=acme", "name=vpc", "provider=aws", "version=1.0.0", Bytes::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation { field: "namespace", .. }), "got: {err:?}");

    storage.upload_module(&ctx(), "acme", "vpc", "aws", "1.0.0", Bytes::from("current")).await.unwrap();
    let legacy = legacy_module_key("reg", "acme", "net", "aws", "2.0.0", "tar.gz");
    backend.put(&legacy, Bytes::from("legacy")).await.unwrap();

    let reporter = RecordingReporter::new();
    let report = storage.migrate_modules(&ctx(), &reporter, false).await.unwrap();

    // Only the real legacy key moves; the current module is left alone.
    assert_eq!(reporter.candidates(), [legacy.clone()]);
    assert_eq!(report.copied, 1);
    assert_eq!(
        backend.keys(),
        [
            "reg/modules/acme/net/aws/2.0.0/net.tar.gz",
            "reg/modules/acme/vpc/aws/1.0.0/vpc.tar.gz",
            legacy.as_str(),
        ]
    );
}

#[tokio::test]
async fn hive_shaped_provider_coordinates_are_rejected_on_upload() {
    let (backend, storage) = registry("reg");
    let err = storage
        .upload_provider_release_files(
            &ctx(),
            "namespace=acme",
            "name=foo",
            "terraform-provider-foo_1.0.0_linux_amd64.zip",
            Bytes::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation { field: "namespace", .. }), "got: {err:?}");

    let archive = legacy_provider_archive_key("reg", "acme", "foo", "1.0.0", "linux", "amd64");
    let keys = legacy_signing_keys_key("reg", "acme");
    backend.put(&archive, Bytes::from("zip")).await.unwrap();
    backend.put(&keys, Bytes::from("{}")).await.unwrap();

    let reporter = RecordingReporter::new();
    let report = storage.migrate_providers(&ctx(), &reporter, true).await.unwrap();
    assert_eq!(report.candidates, 2);
    let mut candidates = reporter.candidates();
    candidates.sort();
    assert_eq!(candidates, [archive, keys]);
}

// ---------------------------------------------------------------------------
// FailingCopyBackend: copy number N (0-based) fails
// ---------------------------------------------------------------------------

struct FailingCopyBackend {
    inner: MemoryBackend,
    copies: AtomicUsize,
    fail_at: usize,
}

#[async_trait]
impl StorageBackend for FailingCopyBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn list_page(&self, prefix: &str, continuation: Option<String>) -> StorageResult<ListPage> {
        self.inner.list_page(prefix, continuation).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, body: Bytes) -> StorageResult<()> {
        self.inner.put(key, body).await
    }

    async fn copy(&self, source: &str, destination: &str) -> StorageResult<()> {
        if self.copies.fetch_add(1, Ordering::SeqCst) == self.fail_at {
            return Err(StorageError::backend("copy", source, "access denied"));
        }
        self.inner.copy(source, destination).await
    }

    async fn presign(&self, key: &str, expiry: Duration) -> StorageResult<String> {
        self.inner.presign(key, expiry).await
    }
}

#[tokio::test]
async fn copy_failure_aborts_and_keeps_earlier_copies() {
    let inner = MemoryBackend::with_page_size("bucket", 2);
    seed(&inner).await;
    let backend = FailingCopyBackend { inner: inner.clone(), copies: AtomicUsize::new(0), fail_at: 1 };
    let config = RegistryConfig::builder().prefix("reg").build().unwrap();
    let storage = RegistryStorage::new(Arc::new(backend), &config);
    let reporter = RecordingReporter::new();

    let err = storage.migrate_modules(&ctx(), &reporter, false).await.unwrap_err();

    assert!(matches!(err, StorageError::Backend { operation: "copy", .. }), "got: {err:?}");
    // One copy succeeded before the failure; the third key was never attempted.
    assert_eq!(inner.copy_count(), 1);
    let events = reporter.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], MigrationEvent::Copied { .. }));
    assert!(matches!(events[1], MigrationEvent::Failed { .. }));
}
