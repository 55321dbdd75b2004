//! Output module for harvested documents and run reports
//!
//! This module handles:
//! - Rendering extracted documents as Markdown
//! - Writing the local Markdown + JSON sidecar artifacts
//! - Printing run, import and progress statistics

mod markdown;
pub mod stats;

pub use markdown::render_markdown;
pub use stats::{
    load_statistics, print_classification_summary, print_import_summary, print_index_validation,
    print_run_summary, print_statistics, ProgressReport,
};

use crate::extract::ExtractedDocument;
use crate::storage::{write_atomic, StorageResult};
use crate::url::safe_filename;
use std::path::{Path, PathBuf};

/// Paths of the artifacts written for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifacts {
    pub markdown: PathBuf,
    pub sidecar: PathBuf,
}

/// Writes `{safe-key}.md` and `{safe-key}.json` into `dir`
///
/// Both files are written atomically; a crash leaves either the previous
/// version or the new one.
///
/// # Arguments
///
/// * `dir` - The processed documents directory
/// * `doc` - The extracted document (serialized as the JSON sidecar)
/// * `markdown` - The rendered Markdown body
pub fn write_local_artifacts(
    dir: &Path,
    doc: &ExtractedDocument,
    markdown: &str,
) -> StorageResult<LocalArtifacts> {
    let stem = safe_filename(&doc.key);
    let artifacts = LocalArtifacts {
        markdown: dir.join(format!("{}.md", stem)),
        sidecar: dir.join(format!("{}.json", stem)),
    };

    let sidecar = serde_json::to_vec_pretty(doc)?;
    write_atomic(&artifacts.sidecar, &sidecar)?;
    write_atomic(&artifacts.markdown, markdown.as_bytes())?;

    Ok(artifacts)
}
