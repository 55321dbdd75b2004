//! Batch import with retry and operation polling

use crate::config::IndexerConfig;
use crate::crawler::RetryPolicy;
use crate::indexer::client::{ChunkConfig, CorpusClient, ImportCounts};
use crate::indexer::IndexError;
use crate::state::BatchState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Tunables of the import loop
#[derive(Debug, Clone, Copy)]
pub struct ImportSettings {
    pub batch_size: usize,
    pub chunk: ChunkConfig,
    pub rate_limited: RetryPolicy,
    pub busy: RetryPolicy,
    pub poll_interval: Duration,
    pub slow_poll_interval: Duration,
    pub slow_poll_after: Duration,
    pub max_wait: Duration,
    pub settle: Duration,
}

impl ImportSettings {
    pub fn from_config(config: &IndexerConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            chunk: ChunkConfig::from_config(config),
            rate_limited: RetryPolicy::import_rate_limited(config),
            busy: RetryPolicy::import_busy(config),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            slow_poll_interval: Duration::from_millis(config.slow_poll_interval_ms),
            slow_poll_after: Duration::from_secs(config.slow_poll_after_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
            settle: Duration::from_millis(config.batch_settle_ms),
        }
    }

    /// Poll interval after `elapsed` time spent waiting
    fn poll_interval_after(&self, elapsed: Duration) -> Duration {
        if elapsed >= self.slow_poll_after {
            self.slow_poll_interval
        } else {
            self.poll_interval
        }
    }
}

/// One batch of object URIs on its way into the corpus
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub number: usize,
    pub uris: Vec<String>,
    pub chunk: ChunkConfig,
    pub operation: Option<String>,
    state: BatchState,
}

impl ImportBatch {
    pub fn new(number: usize, uris: Vec<String>, chunk: ChunkConfig) -> Self {
        Self {
            number,
            uris,
            chunk,
            operation: None,
            state: BatchState::Submitted,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Moves to `next` if the transition is legal
    pub fn transition(&mut self, next: BatchState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            warn!(
                "Ignoring illegal batch {} transition {} -> {}",
                self.number, self.state, next
            );
            false
        }
    }
}

/// How a submission went, including every backoff that was slept
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

impl SubmitReport {
    pub fn retries(&self) -> usize {
        self.delays.len()
    }
}

/// Terminal result of polling one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Done(Option<ImportCounts>),
    Failed(String),
    TimedOut,
}

/// Terminal record of one batch
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub number: usize,
    pub size: usize,
    pub state: BatchState,
    pub operation: Option<String>,
    pub counts: Option<ImportCounts>,
    pub error: Option<String>,
    pub submit: SubmitReport,
}

/// Outcome of an import run
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub batches: Vec<BatchResult>,
}

impl ImportSummary {
    pub fn count(&self, state: BatchState) -> usize {
        self.batches.iter().filter(|b| b.state == state).count()
    }

    /// Documents the corpus reported as imported
    pub fn imported(&self) -> u64 {
        self.batches
            .iter()
            .filter_map(|b| b.counts)
            .map(|c| c.imported_count)
            .sum()
    }

    pub fn submitted_uris(&self) -> usize {
        self.batches.iter().map(|b| b.size).sum()
    }

    /// True when every batch reached `Done`
    pub fn all_succeeded(&self) -> bool {
        self.batches.iter().all(|b| b.state.is_success())
    }
}

/// Single writer against the remote corpus
pub struct BatchImporter {
    client: Arc<dyn CorpusClient>,
    settings: ImportSettings,
    writer: Mutex<()>,
}

impl BatchImporter {
    pub fn new(client: Arc<dyn CorpusClient>, settings: ImportSettings) -> Self {
        Self {
            client,
            settings,
            writer: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Submits one batch, retrying rate-limit and busy rejections
    ///
    /// # Returns
    ///
    /// The operation name (or the final error) and a report of every attempt
    pub async fn import_batch(
        &self,
        uris: &[String],
        chunk: &ChunkConfig,
    ) -> (Result<String, IndexError>, SubmitReport) {
        let mut report = SubmitReport::default();
        let mut rate_limited_retries = 0u32;
        let mut busy_retries = 0u32;

        loop {
            report.attempts += 1;
            let error = match self.client.import(uris, chunk).await {
                Ok(operation) => return (Ok(operation), report),
                Err(e) => e,
            };

            let (schedule, retry) = match &error {
                IndexError::RateLimited | IndexError::Transport(_) => {
                    rate_limited_retries += 1;
                    (&self.settings.rate_limited, rate_limited_retries - 1)
                }
                IndexError::CorpusBusy(_) => {
                    busy_retries += 1;
                    (&self.settings.busy, busy_retries - 1)
                }
                _ => return (Err(error), report),
            };

            if !schedule.allows_another(report.attempts) {
                return (Err(error), report);
            }

            let delay = schedule.delay_for(retry);
            warn!(
                "Import attempt {} rejected ({}), waiting {:?}",
                report.attempts, error, delay
            );
            report.delays.push(delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Polls an operation until it finishes or `max_wait` elapses
    ///
    /// Polling is fast at first and slows down after the configured threshold.
    /// Transient poll failures are logged and polling continues; a rejected
    /// poll (e.g. unknown operation) ends it as failed.
    pub async fn poll_until_done(&self, operation: &str, max_wait: Duration) -> PollOutcome {
        let start = Instant::now();

        loop {
            match self.client.get_operation(operation).await {
                Ok(status) if status.done => {
                    return match status.error {
                        Some(err) => PollOutcome::Failed(format!("{} (code {})", err.message, err.code)),
                        None => PollOutcome::Done(status.response),
                    };
                }
                Ok(_) => {}
                Err(e) if e.is_retryable() => {
                    warn!("Polling {} failed, will retry: {}", operation, e);
                }
                Err(e) => return PollOutcome::Failed(e.to_string()),
            }

            let elapsed = start.elapsed();
            if elapsed >= max_wait {
                return PollOutcome::TimedOut;
            }
            let interval = self.settings.poll_interval_after(elapsed);
            debug!("Operation {} still running after {:?}", operation, elapsed);
            tokio::time::sleep(interval.min(max_wait - elapsed)).await;
        }
    }

    /// Imports every URI in sequential batches
    ///
    /// Each batch is submitted only after the previous one reached a terminal
    /// state. A failed batch is logged and skipped; it never blocks the rest.
    pub async fn import_all(&self, uris: &[String]) -> ImportSummary {
        let _writer = self.writer.lock().await;

        let batches: Vec<&[String]> = uris.chunks(self.settings.batch_size).collect();
        let total = batches.len();
        let mut summary = ImportSummary::default();
        info!("Importing {} documents in {} batches", uris.len(), total);

        for (i, chunk) in batches.into_iter().enumerate() {
            let mut batch = ImportBatch::new(i + 1, chunk.to_vec(), self.settings.chunk);
            let result = self.run_batch(&mut batch, total).await;
            summary.batches.push(result);

            if i + 1 < total && !self.settings.settle.is_zero() {
                tokio::time::sleep(self.settings.settle).await;
            }
        }

        info!(
            "Import finished: {} done, {} failed, {} timed out ({} documents reported imported)",
            summary.count(BatchState::Done),
            summary.count(BatchState::Failed),
            summary.count(BatchState::TimedOut),
            summary.imported()
        );
        summary
    }

    async fn run_batch(&self, batch: &mut ImportBatch, total: usize) -> BatchResult {
        let (submitted, submit) = self.import_batch(&batch.uris, &batch.chunk).await;
        let mut counts = None;
        let mut failure = None;

        match submitted {
            Err(e) => {
                error!(
                    "Batch {}/{}: submission failed after {} attempts: {}",
                    batch.number, total, submit.attempts, e
                );
                batch.transition(BatchState::Failed);
                failure = Some(e.to_string());
            }
            Ok(operation) => {
                info!(
                    "Batch {}/{}: import started ({} files) - op {}",
                    batch.number,
                    total,
                    batch.uris.len(),
                    operation
                );
                batch.operation = Some(operation.clone());
                batch.transition(BatchState::Polling);

                match self.poll_until_done(&operation, self.settings.max_wait).await {
                    PollOutcome::Done(reported) => {
                        batch.transition(BatchState::Done);
                        counts = reported;
                        let c = reported.unwrap_or_default();
                        info!(
                            "Batch {}/{}: done (imported {}, failed {}, skipped {})",
                            batch.number, total, c.imported_count, c.failed_count, c.skipped_count
                        );
                    }
                    PollOutcome::Failed(message) => {
                        batch.transition(BatchState::Failed);
                        error!("Batch {}/{}: operation failed: {}", batch.number, total, message);
                        failure = Some(message);
                    }
                    PollOutcome::TimedOut => {
                        batch.transition(BatchState::TimedOut);
                        warn!(
                            "Batch {}/{}: still running after {:?}, check {} manually",
                            batch.number, total, self.settings.max_wait, operation
                        );
                    }
                }
            }
        }

        BatchResult {
            number: batch.number,
            size: batch.uris.len(),
            state: batch.state(),
            operation: batch.operation.clone(),
            counts,
            error: failure,
            submit,
        }
    }
}
