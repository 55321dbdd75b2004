//! Storage module for persisting harvested documents
//!
//! This module handles:
//! - The `ObjectStore` seam documents and images are uploaded through
//! - Filesystem and Google Cloud Storage object stores
//! - Atomic (temp file + rename) writes for local state files
//! - Object path conventions shared by the uploader and the indexer

mod fs;
mod gcs;
mod traits;

pub use fs::{write_atomic, FsObjectStore};
pub use gcs::GcsObjectStore;
pub use traits::{ObjectStore, StorageError, StorageResult};

use crate::url::safe_filename;

/// Prefix under which document Markdown bodies are stored
pub const PROCESSED_PREFIX: &str = "processed/";

/// Prefix under which re-hosted images are stored
pub const IMAGES_PREFIX: &str = "images/";

/// Prefix under which per-document image metadata is stored
pub const METADATA_PREFIX: &str = "metadata/";

/// Object path of a document body
pub fn document_path(key: &str) -> String {
    format!("{}{}.md", PROCESSED_PREFIX, safe_filename(key))
}

/// Object path of a re-hosted image
pub fn image_path(key: &str, filename: &str) -> String {
    format!("{}{}/{}", IMAGES_PREFIX, safe_filename(key), safe_filename(filename))
}

/// Object path of a document's image metadata
pub fn metadata_path(key: &str) -> String {
    format!("{}{}.json", METADATA_PREFIX, safe_filename(key))
}
