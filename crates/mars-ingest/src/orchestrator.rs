//! Import orchestrator
//!
//! Resolves the sol range, fetches the manifest once, then fans out twice:
//! one task per sol fetches and normalizes its catalog, and that task spawns
//! one task per full-resolution image to write it. Every task of both levels
//! is spawned on a single [`TaskTracker`], so waiting on the tracker joins the
//! whole run.
//!
//! Failures below the manifest are isolated. A catalog that cannot be
//! fetched, or an image the sink rejects, is logged and dropped without
//! touching sibling tasks. Nothing is retried.
//!
//! Concurrency is unbounded unless the config sets fetch or write limits, in
//! which case each task takes a semaphore permit around its I/O.

use mars_common::types::{ImportResult, MarsImage, SolRef};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::normalize::normalize_catalog;
use crate::sink::{ImageSink, WriteOutcome};
use crate::source::{CatalogSource, ManifestSource};

/// Runs imports of a sol range into a sink
pub struct ImportOrchestrator {
    config: ImportConfig,
    manifests: Arc<dyn ManifestSource>,
    catalogs: Arc<dyn CatalogSource>,
    sink: Arc<dyn ImageSink>,
}

/// Counters shared by every task of a run. Only ever incremented.
#[derive(Debug, Default)]
struct ImportCounters {
    written: AtomicU64,
    inserted: AtomicU64,
    batches_failed: AtomicU64,
    records_failed: AtomicU64,
}

impl ImportCounters {
    fn record_write(&self, outcome: WriteOutcome) {
        self.written.fetch_add(1, Ordering::Relaxed);
        if outcome == WriteOutcome::Inserted {
            self.inserted.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self, batches_requested: usize, started: Instant) -> ImportResult {
        ImportResult {
            count: self.written.load(Ordering::Acquire),
            inserted: self.inserted.load(Ordering::Acquire),
            batches_requested,
            batches_failed: self.batches_failed.load(Ordering::Acquire),
            records_failed: self.records_failed.load(Ordering::Acquire),
            duration: started.elapsed(),
        }
    }
}

/// State handed to every sol and image task of one run
struct RunContext {
    catalogs: Arc<dyn CatalogSource>,
    sink: Arc<dyn ImageSink>,
    counters: ImportCounters,
    tracker: TaskTracker,
    fetch_permits: Option<Semaphore>,
    write_permits: Option<Semaphore>,
}

async fn acquire(permits: Option<&Semaphore>) -> Option<SemaphorePermit<'_>> {
    match permits {
        // the semaphore is never closed
        Some(semaphore) => semaphore.acquire().await.ok(),
        None => None,
    }
}

impl ImportOrchestrator {
    pub fn new(
        config: ImportConfig,
        manifests: Arc<dyn ManifestSource>,
        catalogs: Arc<dyn CatalogSource>,
        sink: Arc<dyn ImageSink>,
    ) -> Self {
        Self {
            config,
            manifests,
            catalogs,
            sink,
        }
    }

    /// Build from one value that serves both the manifest and the catalogs
    pub fn with_source<S>(config: ImportConfig, source: Arc<S>, sink: Arc<dyn ImageSink>) -> Self
    where
        S: ManifestSource + CatalogSource + 'static,
    {
        Self::new(config, source.clone(), source, sink)
    }

    /// Import every sol in the configured range.
    ///
    /// Returns once every catalog fetch and every image write spawned by the
    /// run has finished. Only a manifest failure, an out-of-bounds range or
    /// an invalid config produce an error.
    #[instrument(skip(self), fields(start = self.config.start, end = self.config.end))]
    pub async fn run(&self) -> Result<ImportResult, ImportError> {
        let started = Instant::now();
        self.config.validate()?;

        let requested = self.config.range();
        if requested.is_empty_for_any_manifest() {
            info!("Sol range is empty, nothing to import");
            return Ok(ImportResult::empty(started.elapsed()));
        }

        let manifest = self
            .manifests
            .fetch_manifest()
            .await
            .map_err(ImportError::Manifest)?;

        let resolved = requested.resolve(manifest.len());
        if resolved.is_empty() {
            info!(
                total_sols = manifest.len(),
                resolved_start = resolved.start,
                resolved_end = resolved.end,
                "Resolved sol range is empty, nothing to import"
            );
            return Ok(ImportResult::empty(started.elapsed()));
        }

        let sols = resolved.select(&manifest)?;

        info!(
            total_sols = manifest.len(),
            resolved_start = resolved.start,
            resolved_end = resolved.end,
            "Importing {} sols",
            sols.len()
        );

        let context = Arc::new(RunContext {
            catalogs: self.catalogs.clone(),
            sink: self.sink.clone(),
            counters: ImportCounters::default(),
            tracker: TaskTracker::new(),
            fetch_permits: self.config.max_concurrent_fetches.map(Semaphore::new),
            write_permits: self.config.max_concurrent_writes.map(Semaphore::new),
        });

        for sol_ref in sols {
            let span = info_span!("sol", sol = sol_ref.sol);
            context
                .tracker
                .spawn(import_sol(context.clone(), sol_ref.clone()).instrument(span));
        }

        // Image tasks are spawned by sol tasks on the same tracker, possibly
        // after close(); wait() only returns once both levels are done.
        context.tracker.close();
        context.tracker.wait().await;

        let result = context.counters.snapshot(sols.len(), started);

        if result.batches_failed > 0 || result.records_failed > 0 {
            warn!(
                batches_failed = result.batches_failed,
                records_failed = result.records_failed,
                "Import finished with failures"
            );
        }

        info!(
            count = result.count,
            inserted = result.inserted,
            duplicates = result.duplicates(),
            "Imported {} images in {:.2?}",
            result.count,
            result.duration
        );

        Ok(result)
    }
}

/// Fetch one sol's catalog and spawn a write task per full-resolution image.
async fn import_sol(context: Arc<RunContext>, sol_ref: SolRef) {
    let catalog = {
        let _permit = acquire(context.fetch_permits.as_ref()).await;
        match context.catalogs.fetch_catalog(&sol_ref.catalog_url).await {
            Ok(catalog) => catalog,
            Err(e) => {
                context.counters.batches_failed.fetch_add(1, Ordering::Relaxed);
                let url = e.url().unwrap_or(sol_ref.catalog_url.as_str());
                error!(url = %url, error = %e, "Error fetching catalog");
                return;
            },
        }
    };

    let normalized = normalize_catalog(catalog);
    let full_resolution = normalized.full_resolution();

    for image in normalized.images {
        context
            .tracker
            .spawn(write_image(context.clone(), image).in_current_span());
    }

    info!(
        catalog_sol = normalized.sol,
        full_resolution,
        total = normalized.total_records,
        "Found {}/{} full scale images for sol {}",
        full_resolution,
        normalized.total_records,
        normalized.sol
    );
}

async fn write_image(context: Arc<RunContext>, image: MarsImage) {
    let _permit = acquire(context.write_permits.as_ref()).await;
    match context.sink.insert_image(&image).await {
        Ok(outcome) => {
            context.counters.record_write(outcome);
            debug!(item_name = %image.item_name, ?outcome, "Image written");
        },
        Err(e) => {
            context.counters.records_failed.fetch_add(1, Ordering::Relaxed);
            error!(url = %image.url, item_name = %image.item_name, error = %e, "Error inserting image");
        },
    }
}
