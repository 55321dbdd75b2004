//! Storage traits and error types
//!
//! This module defines the trait interface for object storage backends and
//! associated error types.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Bucket not found: {0}")]
    NotFound(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State already loaded from {0}")]
    AlreadyLoaded(String),

    #[error("Upload failed for {path}: {message}")]
    Upload { path: String, message: String },

    #[error("Object store request failed for {path}: {message}")]
    Request { path: String, message: String },

    #[error("Missing access token: environment variable {0} is not set")]
    MissingToken(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable object storage the indexer reads documents from
///
/// Implementations must be safe to share between workers; every method takes
/// `&self`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes an object, replacing any previous content at `path`
    ///
    /// # Returns
    ///
    /// The canonical URI of the stored object (e.g. `gs://bucket/path`)
    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Checks whether an object exists
    async fn object_exists(&self, bucket: &str, path: &str) -> StorageResult<bool>;

    /// Lists object paths under a prefix, sorted
    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>>;

    /// Canonical URI of an object, whether or not it exists yet
    fn object_uri(&self, bucket: &str, path: &str) -> String;
}
