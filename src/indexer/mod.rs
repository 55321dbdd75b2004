//! Corpus indexing
//!
//! This module handles:
//! - Uploading documents, re-hosted images and image metadata to object storage
//! - Submitting object URIs to the remote corpus in fixed-size batches
//! - Retrying rate-limit and corpus-busy rejections with exponential backoff
//! - Polling long-running import operations to a terminal state
//!
//! The remote corpus accepts one mutating operation at a time, so every import
//! goes through a single [`BatchImporter`] that holds a writer lock for the
//! whole submit-and-poll sequence.

mod batch;
mod client;
mod uploader;

pub use batch::{
    BatchImporter, BatchResult, ImportBatch, ImportSettings, ImportSummary, PollOutcome,
    SubmitReport,
};
pub use client::{
    classify_rejection, ChunkConfig, CorpusClient, CorpusState, CorpusStatus, HttpCorpusClient,
    ImportCounts, OperationError, OperationStatus, BUSY_MARKER,
};
pub use uploader::{HostedImage, UploadReceipt, Uploader};

use crate::storage::{ObjectStore, PROCESSED_PREFIX};
use crate::ErrorKind;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use tracing::info;

/// Errors returned by the remote corpus
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Rate limited by the corpus endpoint")]
    RateLimited,

    #[error("Corpus is busy with another operation: {0}")]
    CorpusBusy(String),

    #[error("Request rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Missing access token: environment variable {0} is not set")]
    MissingToken(String),
}

impl IndexError {
    /// Maps the error onto the closed taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited => ErrorKind::RateLimit,
            Self::CorpusBusy(_) => ErrorKind::ConcurrentOperation,
            Self::Transport(_) => ErrorKind::TransientNetwork,
            Self::Rejected { status: 404, .. } => ErrorKind::NotFound,
            Self::Rejected { .. } | Self::Decode(_) | Self::MissingToken(_) => ErrorKind::Parse,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Uploaded documents missing from the corpus, and corpus files with no
/// uploaded document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexValidation {
    pub documents: usize,
    pub indexed: usize,
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

impl IndexValidation {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// File name of a document object without its `.md` extension
fn document_stem(path: &str) -> &str {
    path.rsplit('/')
        .next()
        .unwrap_or(path)
        .trim_end_matches(".md")
}

/// Picks the document paths whose display name is not yet in the corpus
///
/// The corpus lists files by display name, which is the object's file name
/// with or without the `.md` extension depending on how it was imported.
pub fn select_unindexed(paths: &[String], indexed: &[String]) -> Vec<String> {
    let indexed: HashSet<&str> = indexed
        .iter()
        .map(|name| name.trim_end_matches(".md"))
        .collect();

    paths
        .iter()
        .filter(|path| path.ends_with(".md"))
        .filter(|path| !indexed.contains(document_stem(path)))
        .cloned()
        .collect()
}

/// Compares uploaded document paths with the corpus's display names, by stem
pub fn compare_indexed(paths: &[String], indexed: &[String]) -> IndexValidation {
    let documents: BTreeSet<&str> = paths
        .iter()
        .filter(|path| path.ends_with(".md"))
        .map(|path| document_stem(path))
        .collect();
    let indexed: BTreeSet<&str> = indexed
        .iter()
        .map(|name| name.trim_end_matches(".md"))
        .collect();

    IndexValidation {
        documents: documents.len(),
        indexed: indexed.len(),
        missing: documents
            .difference(&indexed)
            .map(|s| s.to_string())
            .collect(),
        extra: indexed
            .difference(&documents)
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Checks that every uploaded document is in the corpus
pub async fn validate_index(
    store: &dyn ObjectStore,
    bucket: &str,
    corpus: &dyn CorpusClient,
) -> crate::Result<IndexValidation> {
    let paths = store.list_objects(bucket, PROCESSED_PREFIX).await?;
    let indexed = corpus.list_indexed().await?;
    Ok(compare_indexed(&paths, &indexed))
}

/// Lists the uploaded documents that still need importing, as object URIs
///
/// # Arguments
///
/// * `store` - Object storage holding `processed/*.md`
/// * `bucket` - The source's bucket
/// * `corpus` - The remote corpus to compare against
pub async fn pending_document_uris(
    store: &dyn ObjectStore,
    bucket: &str,
    corpus: &dyn CorpusClient,
) -> crate::Result<Vec<String>> {
    let paths = store.list_objects(bucket, PROCESSED_PREFIX).await?;
    let indexed = corpus.list_indexed().await?;
    let pending = select_unindexed(&paths, &indexed);

    info!(
        "{} documents uploaded, {} already indexed, {} to import",
        paths.len(),
        paths.len() - pending.len(),
        pending.len()
    );

    Ok(pending
        .iter()
        .map(|path| store.object_uri(bucket, path))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_unindexed() {
        let paths = vec![
            "processed/etomidate.md".to_string(),
            "processed/ketamine.md".to_string(),
            "processed/ketamine.json".to_string(),
            "processed/propofol.md".to_string(),
        ];
        let indexed = vec!["etomidate.md".to_string(), "propofol".to_string()];

        assert_eq!(
            select_unindexed(&paths, &indexed),
            vec!["processed/ketamine.md".to_string()]
        );
    }

    #[test]
    fn test_compare_indexed_reports_both_directions() {
        let paths = vec![
            "processed/etomidate.md".to_string(),
            "processed/etomidate.json".to_string(),
            "processed/ketamine.md".to_string(),
        ];
        let indexed = vec!["etomidate".to_string(), "old-page.md".to_string()];

        let validation = compare_indexed(&paths, &indexed);
        assert_eq!(validation.documents, 2);
        assert_eq!(validation.indexed, 2);
        assert_eq!(validation.missing, vec!["ketamine".to_string()]);
        assert_eq!(validation.extra, vec!["old-page".to_string()]);
        assert!(!validation.is_complete());

        let indexed = vec!["etomidate.md".to_string(), "ketamine".to_string()];
        assert!(compare_indexed(&paths, &indexed).is_complete());
    }

    #[test]
    fn test_index_error_kinds() {
        assert_eq!(IndexError::RateLimited.kind(), ErrorKind::RateLimit);
        assert_eq!(
            IndexError::CorpusBusy(String::new()).kind(),
            ErrorKind::ConcurrentOperation
        );
        assert!(IndexError::Transport("reset".to_string()).is_retryable());
        assert!(!IndexError::Rejected {
            status: 400,
            body: "bad uri".to_string()
        }
        .is_retryable());
    }
}
