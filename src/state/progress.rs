//! Disk-backed progress tracking for bulk runs

use crate::config::StorageConfig;
use crate::storage::{write_atomic, StorageError, StorageResult};
use crate::{ErrorKind, ExtractionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// One recorded failure, keyed by manifest key in `errors.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate counters for the current run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub total: usize,
    pub completed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub images_downloaded: usize,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

/// Snapshot of everything the tracker holds
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    pub completed_keys: BTreeSet<String>,
    pub errors: BTreeMap<String, ErrorRecord>,
    pub stats: ProgressStats,
}

/// What a successful entry contributes to the counters
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionMeta {
    pub images: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressFile {
    last_saved: DateTime<Utc>,
    stats: ProgressStats,
    completed_keys: Vec<String>,
}

/// Thread-safe record of which manifest entries finished and which failed
///
/// A key is never in both the completed set and the error map. Saves write
/// `progress.json` and `errors.json` via temp file + rename, so a crash
/// mid-save leaves the previous file intact.
pub struct ProgressTracker {
    progress_path: PathBuf,
    errors_path: PathBuf,
    state: Mutex<ProgressState>,
    save_lock: Mutex<()>,
    loaded: AtomicBool,
}

impl ProgressTracker {
    /// Creates an empty tracker persisting to the given files
    pub fn new(progress_path: impl Into<PathBuf>, errors_path: impl Into<PathBuf>) -> Self {
        Self {
            progress_path: progress_path.into(),
            errors_path: errors_path.into(),
            state: Mutex::new(ProgressState::default()),
            save_lock: Mutex::new(()),
            loaded: AtomicBool::new(false),
        }
    }

    /// Creates an empty tracker at the configured output locations
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.progress_path(), config.errors_path())
    }

    fn state(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merges persisted progress into this tracker
    ///
    /// Missing files are treated as empty. May be called at most once, before
    /// any worker starts reporting.
    ///
    /// # Returns
    ///
    /// The number of completed keys and error records restored
    pub fn load(&self) -> StorageResult<(usize, usize)> {
        if self.loaded.swap(true, Ordering::SeqCst) {
            return Err(StorageError::AlreadyLoaded(
                self.progress_path.display().to_string(),
            ));
        }

        let progress: Option<ProgressFile> = read_json(&self.progress_path)?;
        let errors: Option<BTreeMap<String, ErrorRecord>> = read_json(&self.errors_path)?;

        let mut state = self.state();
        if let Some(progress) = progress {
            state.completed_keys.extend(progress.completed_keys);
            state.stats = progress.stats;
        }
        if let Some(errors) = errors {
            for (key, record) in errors {
                if !state.completed_keys.contains(&key) {
                    state.errors.insert(key, record);
                }
            }
        }

        info!(
            "Loaded progress: {} completed, {} errors",
            state.completed_keys.len(),
            state.errors.len()
        );
        Ok((state.completed_keys.len(), state.errors.len()))
    }

    /// Resets run counters before dispatch
    pub fn begin_run(&self, total: usize, skipped: usize) {
        let mut state = self.state();
        state.stats = ProgressStats {
            total,
            skipped,
            started_at: Some(Utc::now()),
            ..ProgressStats::default()
        };
    }

    /// Records a successful entry, clearing any earlier error for it
    ///
    /// # Returns
    ///
    /// Number of entries finished so far in this run
    pub fn mark_completed(&self, key: &str, meta: CompletionMeta) -> usize {
        let mut state = self.state();
        state.errors.remove(key);
        state.completed_keys.insert(key.to_string());
        state.stats.completed += 1;
        state.stats.images_downloaded += meta.images;
        state.stats.completed + state.stats.errored
    }

    /// Records a failed entry, replacing any earlier record for it
    ///
    /// # Returns
    ///
    /// Number of entries finished so far in this run
    pub fn mark_error(&self, key: &str, error: &ExtractionError) -> usize {
        self.record_error(key, error.to_string(), Some(error.kind()))
    }

    /// Records a failure that has no typed cause (e.g. a panicked worker)
    pub fn record_error(&self, key: &str, message: String, kind: Option<ErrorKind>) -> usize {
        let mut state = self.state();
        state.completed_keys.remove(key);
        state.errors.insert(
            key.to_string(),
            ErrorRecord {
                error: message,
                kind,
                timestamp: Utc::now(),
            },
        );
        state.stats.errored += 1;
        state.stats.completed + state.stats.errored
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.state().completed_keys.contains(key)
    }

    /// Keys with a recorded error, sorted
    pub fn error_keys(&self) -> Vec<String> {
        self.state().errors.keys().cloned().collect()
    }

    pub fn completed_count(&self) -> usize {
        self.state().completed_keys.len()
    }

    /// Returns a consistent copy of the whole state
    pub fn snapshot(&self) -> ProgressState {
        self.state().clone()
    }

    /// Persists progress and errors atomically
    ///
    /// `errors.json` is always rewritten, even when empty, so a stale error
    /// list never survives a run that fixed it.
    pub fn save(&self) -> StorageResult<()> {
        // Serialize under the save lock so concurrent saves land in order
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (progress_json, errors_json, completed, errored) = {
            let state = self.state();
            let file = ProgressFile {
                last_saved: Utc::now(),
                stats: state.stats.clone(),
                completed_keys: state.completed_keys.iter().cloned().collect(),
            };
            (
                serde_json::to_vec_pretty(&file)?,
                serde_json::to_vec_pretty(&state.errors)?,
                state.completed_keys.len(),
                state.errors.len(),
            )
        };

        write_atomic(&self.progress_path, &progress_json)?;
        write_atomic(&self.errors_path, &errors_json)?;

        debug!(
            "Saved progress: {} completed, {} errors",
            completed, errored
        );
        Ok(())
    }

    pub fn progress_path(&self) -> &Path {
        &self.progress_path
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
