//! Bulk orchestrator - drives a manifest through the per-entry pipeline
//!
//! This module contains the dispatch loop that coordinates a scrape run:
//! - Selecting manifest entries according to the run mode
//! - Pacing dispatches and bounding the worker pool
//! - Running fetch → extract → persist → upload → report per entry
//! - Periodic checkpoints and interrupt handling

use crate::config::ScraperConfig;
use crate::crawler::scheduler::Pacer;
use crate::discovery::{Manifest, ManifestEntry};
use crate::extract::Extract;
use crate::indexer::Uploader;
use crate::output::{render_markdown, write_local_artifacts};
use crate::state::{CompletionMeta, ProgressTracker, RunMode};
use crate::{ErrorKind, ExtractionError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Per-run dispatch options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: RunMode,
    pub workers: usize,
    /// Dispatch at most this many entries
    pub limit: Option<usize>,
}

impl RunOptions {
    pub fn new(mode: RunMode, workers: usize) -> Self {
        Self {
            mode,
            workers: workers.max(1),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// Entries selected for a run
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    pub entries: Vec<ManifestEntry>,
    /// Manifest entries the mode filtered out
    pub skipped: usize,
}

/// Outcome of one orchestrator run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub dispatched: usize,
    pub completed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub images: usize,
    pub elapsed: Duration,
    /// True if a shutdown signal arrived before every entry reported
    pub interrupted: bool,
    /// Object URIs of uploaded documents, in completion order
    pub uploaded_uris: Vec<String>,
    pub errors_by_kind: HashMap<ErrorKind, usize>,
}

/// What a worker reports back to the dispatch loop
#[derive(Debug)]
struct EntryReport {
    key: String,
    /// Entries finished in this run, as counted by the tracker
    finished: usize,
    outcome: std::result::Result<EntryDone, ExtractionError>,
}

#[derive(Debug)]
struct EntryDone {
    images: usize,
    document_uri: Option<String>,
}

/// Everything a worker needs, shared across tasks
struct Pipeline {
    extractor: Arc<dyn Extract>,
    tracker: Arc<ProgressTracker>,
    uploader: Option<Arc<Uploader>>,
    processed_dir: PathBuf,
}

impl Pipeline {
    /// Runs one entry end to end and reports the result to the tracker
    ///
    /// Never fails: every error is recorded against the entry's key.
    ///
    /// An earlier error record stays in place until the entry reports again,
    /// so an entry abandoned at shutdown is still retried by a later run.
    async fn process(&self, entry: ManifestEntry) -> EntryReport {
        let outcome = self.run_entry(&entry).await;
        let finished = match &outcome {
            Ok(done) => self.tracker.mark_completed(
                &entry.key,
                CompletionMeta {
                    images: done.images,
                },
            ),
            Err(e) => {
                if e.kind().is_systemic() {
                    warn!("Failed {}: {}", entry.key, e);
                } else {
                    info!("Skipping {}: {}", entry.key, e);
                }
                self.tracker.mark_error(&entry.key, e)
            }
        };

        EntryReport {
            key: entry.key,
            finished,
            outcome,
        }
    }

    async fn run_entry(
        &self,
        entry: &ManifestEntry,
    ) -> std::result::Result<EntryDone, ExtractionError> {
        let doc = self.extractor.extract(&entry.key, &entry.url).await?;
        let markdown = render_markdown(&doc);

        write_local_artifacts(&self.processed_dir, &doc, &markdown).map_err(|e| {
            ExtractionError::Persist {
                key: entry.key.clone(),
                message: e.to_string(),
            }
        })?;

        let Some(uploader) = &self.uploader else {
            debug!(
                "Extracted {} ({} sections, hash {})",
                entry.key,
                doc.sections.len(),
                doc.content_hash
            );
            return Ok(EntryDone {
                images: 0,
                document_uri: None,
            });
        };

        let receipt = uploader
            .upload(&doc, &markdown)
            .await
            .map_err(|e| ExtractionError::Persist {
                key: entry.key.clone(),
                message: e.to_string(),
            })?;

        debug!(
            "Uploaded {} to {} ({} images)",
            entry.key,
            receipt.document_uri,
            receipt.images.len()
        );
        Ok(EntryDone {
            images: receipt.images.len(),
            document_uri: Some(receipt.document_uri),
        })
    }
}

/// Bulk orchestrator for one source
///
/// Owns the dispatch loop; every worker shares one [`ProgressTracker`],
/// which is the only state mutated concurrently.
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    request_delay: Duration,
    checkpoint_interval: usize,
    shutdown_grace: Duration,
}

impl Orchestrator {
    /// Creates an orchestrator without uploads
    ///
    /// # Arguments
    ///
    /// * `extractor` - Produces a document per manifest entry
    /// * `tracker` - Progress state; loaded by [`Orchestrator::run`] when the mode requires it
    /// * `config` - Pacing, checkpoint and shutdown settings
    /// * `processed_dir` - Directory receiving the local Markdown and JSON artifacts
    pub fn new(
        extractor: Arc<dyn Extract>,
        tracker: Arc<ProgressTracker>,
        config: &ScraperConfig,
        processed_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                extractor,
                tracker,
                uploader: None,
                processed_dir: processed_dir.into(),
            }),
            request_delay: config.request_delay(),
            checkpoint_interval: config.checkpoint_interval.max(1),
            shutdown_grace: config.shutdown_grace(),
        }
    }

    /// Uploads every extracted document through `uploader`
    pub fn with_uploader(mut self, uploader: Arc<Uploader>) -> Self {
        if let Some(pipeline) = Arc::get_mut(&mut self.pipeline) {
            pipeline.uploader = Some(uploader);
        }
        self
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.pipeline.tracker
    }

    /// Selects the entries a run dispatches, given the tracker's current state
    pub fn plan(&self, manifest: &Manifest, options: &RunOptions) -> DispatchPlan {
        let tracker = &self.pipeline.tracker;
        let selected: Vec<ManifestEntry> = match options.mode {
            RunMode::Normal | RunMode::Force => manifest.entries.clone(),
            RunMode::Resume => manifest
                .entries
                .iter()
                .filter(|entry| !tracker.is_completed(&entry.key))
                .cloned()
                .collect(),
            RunMode::RetryErrorsOnly => {
                let error_keys = tracker.error_keys();
                let orphaned = error_keys
                    .iter()
                    .filter(|key| manifest.get(key).is_none())
                    .count();
                if orphaned > 0 {
                    warn!(
                        "{} error keys are no longer in the manifest and will not be retried",
                        orphaned
                    );
                }
                error_keys
                    .iter()
                    .filter_map(|key| manifest.get(key))
                    .cloned()
                    .collect()
            }
        };

        let skipped = manifest.len() - selected.len();
        let mut entries = selected;
        if let Some(limit) = options.limit {
            entries.truncate(limit);
        }

        DispatchPlan { entries, skipped }
    }

    /// Runs the manifest to completion
    pub async fn run(&self, manifest: &Manifest, options: RunOptions) -> Result<RunSummary> {
        self.run_until(manifest, options, std::future::pending::<()>())
            .await
    }

    /// Runs the manifest until done or until `shutdown` resolves
    ///
    /// On shutdown no new entry is dispatched, progress is saved at once,
    /// in-flight entries get the configured grace period to finish, and a
    /// final save records whatever they reported.
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The run finished or was interrupted cleanly
    /// * `Err(HarvestError)` - The output locations are unusable, progress could
    ///   not be loaded, or the final save failed
    pub async fn run_until<F>(
        &self,
        manifest: &Manifest,
        options: RunOptions,
        shutdown: F,
    ) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let tracker = Arc::clone(&self.pipeline.tracker);
        if options.mode.loads_progress() {
            tracker.load()?;
        }
        std::fs::create_dir_all(&self.pipeline.processed_dir)?;

        let plan = self.plan(manifest, &options);
        let total = plan.entries.len();
        tracker.begin_run(manifest.len(), plan.skipped);
        // Fails fast when the progress files cannot be written
        tracker.save()?;
        info!(
            "Starting {} run: {} to scrape, {} skipped, {} workers",
            options.mode, total, plan.skipped, options.workers
        );

        let started = Instant::now();
        let mut summary = RunSummary {
            skipped: plan.skipped,
            ..RunSummary::default()
        };

        let semaphore = Arc::new(Semaphore::new(options.workers.max(1)));
        let mut pacer = Pacer::new(self.request_delay);
        let mut tasks: JoinSet<EntryReport> = JoinSet::new();
        tokio::pin!(shutdown);

        'dispatch: for entry in plan.entries {
            // Wait for a free worker, reaping finished entries meanwhile
            let permit = loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        summary.interrupted = true;
                        break 'dispatch;
                    }
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        self.reap(joined, &mut summary, total, started);
                    }
                    acquired = Arc::clone(&semaphore).acquire_owned() => match acquired {
                        Ok(permit) => break permit,
                        Err(_) => break 'dispatch,
                    },
                }
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    summary.interrupted = true;
                    break 'dispatch;
                }
                _ = pacer.wait_turn() => {}
            }

            let pipeline = Arc::clone(&self.pipeline);
            summary.dispatched += 1;
            tasks.spawn(async move {
                let report = pipeline.process(entry).await;
                drop(permit);
                report
            });
        }

        if !summary.interrupted {
            // Entries are still in flight; a shutdown now cuts the wait short
            let interrupted = tokio::select! {
                biased;
                _ = &mut shutdown => true,
                _ = self.drain(&mut tasks, &mut summary, total, started) => false,
            };
            summary.interrupted = interrupted;
        }

        if summary.interrupted {
            warn!(
                "Shutdown requested; saving progress and waiting up to {:?} for {} in-flight entries",
                self.shutdown_grace,
                tasks.len()
            );
            if let Err(e) = tracker.save() {
                error!("Failed to save progress on shutdown: {}", e);
            }

            let drained = tokio::time::timeout(
                self.shutdown_grace,
                self.drain(&mut tasks, &mut summary, total, started),
            )
            .await;
            if drained.is_err() {
                warn!("Grace period elapsed; abandoning {} entries", tasks.len());
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
            }
        }

        tracker.save()?;
        summary.elapsed = started.elapsed();

        info!(
            "Run finished: {} completed, {} errors, {} skipped in {:.1}s",
            summary.completed,
            summary.errored,
            summary.skipped,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    async fn drain(
        &self,
        tasks: &mut JoinSet<EntryReport>,
        summary: &mut RunSummary,
        total: usize,
        started: Instant,
    ) {
        while let Some(joined) = tasks.join_next().await {
            self.reap(joined, summary, total, started);
        }
    }

    /// Folds one finished entry into the summary and checkpoints on schedule
    fn reap(
        &self,
        joined: std::result::Result<EntryReport, JoinError>,
        summary: &mut RunSummary,
        total: usize,
        started: Instant,
    ) {
        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                error!("Worker task failed: {}", e);
                return;
            }
        };

        match report.outcome {
            Ok(done) => {
                summary.completed += 1;
                summary.images += done.images;
                if let Some(uri) = done.document_uri {
                    summary.uploaded_uris.push(uri);
                }
                debug!("Completed {}", report.key);
            }
            Err(e) => {
                summary.errored += 1;
                *summary.errors_by_kind.entry(e.kind()).or_insert(0) += 1;
            }
        }

        if report.finished % self.checkpoint_interval == 0 {
            let elapsed = started.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                report.finished as f64 / elapsed
            } else {
                0.0
            };
            info!(
                "Progress: {}/{} finished ({} errors), {:.2} pages/sec",
                report.finished, total, summary.errored, rate
            );
            if let Err(e) = self.pipeline.tracker.save() {
                warn!("Checkpoint save failed: {}", e);
            }
        }
    }
}
