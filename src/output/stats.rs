//! Run and progress statistics
//!
//! This module loads the persisted progress files for `--stats` and prints
//! the end-of-run and end-of-import summaries.

use crate::config::StorageConfig;
use crate::crawler::RunSummary;
use crate::discovery::ClassificationSummary;
use crate::indexer::{CorpusStatus, ImportSummary, IndexValidation};
use crate::state::{BatchState, ProgressStats, ProgressTracker};
use crate::storage::StorageResult;
use std::collections::HashMap;

/// Persisted progress, as reported by `--stats`
#[derive(Debug, Clone)]
pub struct ProgressReport {
    /// Counters from the last saved run
    pub stats: ProgressStats,

    /// Keys completed across all runs
    pub completed_keys: usize,

    /// Keys with an outstanding error
    pub error_keys: usize,

    /// Outstanding errors grouped by kind
    pub errors_by_kind: HashMap<String, usize>,
}

/// Loads statistics from the progress files
///
/// # Arguments
///
/// * `config` - Storage settings locating `progress.json` and `errors.json`
///
/// # Returns
///
/// * `Ok(ProgressReport)` - Successfully loaded statistics (empty if no run yet)
/// * `Err(StorageError)` - A progress file exists but could not be read
pub fn load_statistics(config: &StorageConfig) -> StorageResult<ProgressReport> {
    let tracker = ProgressTracker::from_config(config);
    tracker.load()?;
    let state = tracker.snapshot();

    let mut errors_by_kind = HashMap::new();
    for record in state.errors.values() {
        let kind = record
            .kind
            .map(|k| k.as_str().to_string())
            .unwrap_or_else(|| "unclassified".to_string());
        *errors_by_kind.entry(kind).or_insert(0) += 1;
    }

    Ok(ProgressReport {
        stats: state.stats,
        completed_keys: state.completed_keys.len(),
        error_keys: state.errors.len(),
        errors_by_kind,
    })
}

/// Prints persisted statistics to stdout
pub fn print_statistics(report: &ProgressReport) {
    println!("=== Harvest Statistics ===\n");

    println!("Overall:");
    println!("  Completed keys: {}", report.completed_keys);
    println!("  Keys with errors: {}", report.error_keys);
    println!();

    let stats = &report.stats;
    println!("Last run:");
    if let Some(started) = stats.started_at {
        println!("  Started: {}", started.to_rfc3339());
    }
    println!("  Total in manifest: {}", stats.total);
    println!("  Completed: {}", stats.completed);
    println!("  Errored: {}", stats.errored);
    println!("  Skipped: {}", stats.skipped);
    println!("  Images downloaded: {}", stats.images_downloaded);
    println!();

    if !report.errors_by_kind.is_empty() {
        println!("Errors by kind:");
        for (kind, count) in sorted_counts(&report.errors_by_kind) {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    let attempted = stats.completed + stats.errored;
    println!(
        "Success Rate: {:.1}% ({} / {} attempted)",
        percentage(stats.completed, attempted),
        stats.completed,
        attempted
    );
}

/// Prints the summary of one scrape run
pub fn print_run_summary(summary: &RunSummary) {
    println!("=== Scrape Summary ===\n");
    if summary.interrupted {
        println!("Run was interrupted; progress was saved.\n");
    }
    println!("  Dispatched: {}", summary.dispatched);
    println!("  Completed: {}", summary.completed);
    println!("  Errored: {}", summary.errored);
    println!("  Skipped: {}", summary.skipped);
    println!("  Images: {}", summary.images);
    println!("  Uploaded: {}", summary.uploaded_uris.len());
    println!("  Elapsed: {:.1}s", summary.elapsed.as_secs_f64());

    if !summary.errors_by_kind.is_empty() {
        println!();
        println!("Errors by kind:");
        let by_kind: HashMap<String, usize> = summary
            .errors_by_kind
            .iter()
            .map(|(kind, count)| (kind.to_string(), *count))
            .collect();
        for (kind, count) in sorted_counts(&by_kind) {
            println!("  {}: {}", kind, count);
        }
    }
    println!();
}

/// Prints the outcome of a sequence of import batches
pub fn print_import_summary(summary: &ImportSummary) {
    println!("=== Import Summary ===\n");
    println!("  Batches: {}", summary.batches.len());
    for state in BatchState::all_states() {
        let count = summary.count(state);
        if count > 0 {
            println!("    {}: {}", state, count);
        }
    }
    println!("  URIs submitted: {}", summary.submitted_uris());
    println!("  Files imported: {}", summary.imported());
    println!();
}

/// Number of missing or extra names listed before eliding the rest
const VALIDATION_LIST_LIMIT: usize = 20;

/// Prints the corpus state and how it compares with the uploaded documents
pub fn print_index_validation(status: &CorpusStatus, validation: &IndexValidation) {
    println!("=== Corpus Validation ===\n");
    println!("  Corpus: {}", status.name);
    if !status.display_name.is_empty() {
        println!("  Display name: {}", status.display_name);
    }
    println!("  State: {}", status.state());
    if let Some(updated) = &status.update_time {
        println!("  Updated: {}", updated);
    }
    println!("  Uploaded documents: {}", validation.documents);
    println!("  Indexed files: {}", validation.indexed);
    println!();

    print_name_list("Missing from corpus", &validation.missing);
    print_name_list("Indexed without an uploaded document", &validation.extra);
}

fn print_name_list(label: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    println!("{} ({}):", label, names.len());
    for name in names.iter().take(VALIDATION_LIST_LIMIT) {
        println!("  {}", name);
    }
    if names.len() > VALIDATION_LIST_LIMIT {
        println!("  ... and {} more", names.len() - VALIDATION_LIST_LIMIT);
    }
    println!();
}

/// Prints what discovery found, by classification and by year
pub fn print_classification_summary(summary: &ClassificationSummary) {
    println!("=== Discovery Summary ===\n");
    println!("  Unique pages: {}", summary.total);
    println!();

    println!("By classification:");
    let mut by_classification: Vec<_> = summary.by_classification.iter().collect();
    by_classification.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (tag, count) in by_classification {
        println!(
            "  {}: {} ({:.1}%)",
            tag,
            count,
            percentage(*count, summary.total)
        );
    }
    println!();

    println!("By sitemap:");
    for (origin, count) in &summary.by_origin {
        println!("  {}: {}", origin, count);
    }
    println!();

    println!("By last-modified year:");
    for (year, count) in &summary.by_year {
        println!("  {}: {}", year, count);
    }
    println!();
}

fn sorted_counts(counts: &HashMap<String, usize>) -> Vec<(&String, &usize)> {
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    sorted
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}
