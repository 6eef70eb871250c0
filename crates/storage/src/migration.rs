//! Copy-forward migration from the legacy key layout.
//!
//! Migration walks every key under `<prefix>/modules/` or
//! `<prefix>/providers/`, page by page. For each legacy key it computes the
//! current-layout target and, unless the target already exists, copies the
//! object there. Legacy keys are left in place.
//!
//! - Current-layout and unrelated keys are ignored, so re-running after a
//!   partial migration only touches what is left.
//! - A dry run performs the same scan and reports every candidate without
//!   copying.
//! - The first copy failure stops the migration and is returned; copies made
//!   before it are kept.
//!
//! Progress is reported through a [`MigrationReporter`] supplied by the
//! caller.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    backend::{KeyPager, StorageBackend},
    context::RequestContext,
    error::StorageResult,
    keys::KeyScheme,
    registry::RegistryStorage,
    store::MigrationStorage,
};

/// A single migration progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationEvent {
    /// Dry run: `source` would be copied to `target`.
    Planned {
        /// Legacy key.
        source: String,
        /// Current-layout key.
        target: String,
    },
    /// `source` was copied to `target`.
    Copied {
        /// Legacy key.
        source: String,
        /// Current-layout key.
        target: String,
    },
    /// `target` already exists; `source` was left alone.
    AlreadyMigrated {
        /// Legacy key.
        source: String,
        /// Current-layout key.
        target: String,
    },
    /// Copying `source` failed; migration stops here.
    Failed {
        /// Legacy key.
        source: String,
        /// Current-layout key.
        target: String,
        /// Rendered error.
        error: String,
    },
}

/// Sink for migration progress.
pub trait MigrationReporter: Send + Sync {
    /// Records one event.
    fn report(&self, event: &MigrationEvent);
}

/// Forwards migration events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl MigrationReporter for TracingReporter {
    fn report(&self, event: &MigrationEvent) {
        match event {
            MigrationEvent::Planned { source, target } => {
                tracing::info!(%source, %target, "dry run: would copy");
            },
            MigrationEvent::Copied { source, target } => {
                tracing::info!(%source, %target, "copied");
            },
            MigrationEvent::AlreadyMigrated { source, target } => {
                tracing::debug!(%source, %target, "target exists, skipping");
            },
            MigrationEvent::Failed { source, target, error } => {
                tracing::error!(%source, %target, %error, "copy failed, aborting migration");
            },
        }
    }
}

/// Collects migration events in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<MigrationEvent>>,
}

impl RecordingReporter {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events.lock().clone()
    }

    /// Source keys of `Planned` and `Copied` events, in order.
    #[must_use]
    pub fn candidates(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                MigrationEvent::Planned { source, .. } | MigrationEvent::Copied { source, .. } => {
                    Some(source.clone())
                },
                _ => None,
            })
            .collect()
    }
}

impl MigrationReporter for RecordingReporter {
    fn report(&self, event: &MigrationEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Totals for one migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Keys listed under the root.
    pub scanned: usize,
    /// Legacy keys whose target did not exist yet.
    pub candidates: usize,
    /// Objects copied (always zero for a dry run).
    pub copied: usize,
    /// Legacy keys whose target already existed.
    pub already_migrated: usize,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Modules,
    Providers,
}

impl Kind {
    fn root(self, keys: &KeyScheme) -> String {
        match self {
            Self::Modules => keys.modules_root(),
            Self::Providers => keys.providers_root(),
        }
    }

    fn target(self, keys: &KeyScheme, key: &str) -> Option<String> {
        match self {
            Self::Modules => keys.legacy_module_target(key),
            Self::Providers => keys.legacy_provider_target(key),
        }
    }
}

impl<B: StorageBackend + ?Sized> RegistryStorage<B> {
    /// Copies legacy module keys to the current layout.
    ///
    /// # Errors
    ///
    /// Returns the first listing, existence-check or copy failure.
    #[tracing::instrument(skip(self, ctx, reporter))]
    pub async fn migrate_modules(
        &self,
        ctx: &RequestContext,
        reporter: &dyn MigrationReporter,
        dry_run: bool,
    ) -> StorageResult<MigrationReport> {
        self.migrate(ctx, reporter, dry_run, Kind::Modules).await
    }

    /// Copies legacy provider keys (archives, manifests, signatures and
    /// signing keys documents) to the current layout.
    ///
    /// # Errors
    ///
    /// Returns the first listing, existence-check or copy failure.
    #[tracing::instrument(skip(self, ctx, reporter))]
    pub async fn migrate_providers(
        &self,
        ctx: &RequestContext,
        reporter: &dyn MigrationReporter,
        dry_run: bool,
    ) -> StorageResult<MigrationReport> {
        self.migrate(ctx, reporter, dry_run, Kind::Providers).await
    }

    async fn migrate(
        &self,
        ctx: &RequestContext,
        reporter: &dyn MigrationReporter,
        dry_run: bool,
        kind: Kind,
    ) -> StorageResult<MigrationReport> {
        let backend = self.backend().as_ref();
        let keys = self.key_scheme();
        let root = kind.root(keys);
        let mut pager = KeyPager::new(backend, &root);
        let mut report = MigrationReport::default();

        while let Some(page) = ctx.run(pager.next_page()).await? {
            for source in page {
                report.scanned += 1;
                let Some(target) = kind.target(keys, &source) else {
                    continue;
                };

                if ctx.run(backend.exists(&target)).await? {
                    report.already_migrated += 1;
                    reporter.report(&MigrationEvent::AlreadyMigrated { source, target });
                    continue;
                }

                report.candidates += 1;
                if dry_run {
                    reporter.report(&MigrationEvent::Planned { source, target });
                    continue;
                }

                if let Err(e) = ctx.run(backend.copy(&source, &target)).await {
                    reporter.report(&MigrationEvent::Failed {
                        source,
                        target,
                        error: e.to_string(),
                    });
                    return Err(e);
                }
                report.copied += 1;
                reporter.report(&MigrationEvent::Copied { source, target });
            }
        }

        tracing::info!(
            root = %root,
            dry_run,
            scanned = report.scanned,
            candidates = report.candidates,
            copied = report.copied,
            "migration finished"
        );
        Ok(report)
    }
}

#[async_trait]
impl<B: StorageBackend + ?Sized> MigrationStorage for RegistryStorage<B> {
    async fn migrate_modules(
        &self,
        ctx: &RequestContext,
        reporter: &dyn MigrationReporter,
        dry_run: bool,
    ) -> StorageResult<MigrationReport> {
        RegistryStorage::migrate_modules(self, ctx, reporter, dry_run).await
    }

    async fn migrate_providers(
        &self,
        ctx: &RequestContext,
        reporter: &dyn MigrationReporter,
        dry_run: bool,
    ) -> StorageResult<MigrationReport> {
        RegistryStorage::migrate_providers(self, ctx, reporter, dry_run).await
    }
}
