//! Filesystem-backed object store and atomic local writes

use crate::storage::traits::{ObjectStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Writes `bytes` to `path` atomically
///
/// The content goes to a sibling temp file first and is renamed over the
/// target, so readers observe either the old or the new content, never a
/// partial write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "object".to_string());
    let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp_path, path)
}

/// Object store that maps `bucket/path` onto a directory tree
///
/// URIs keep the configured scheme (`gs://bucket/path` by default) so the
/// documents can be mirrored to a real bucket without rewriting manifests.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    scheme: String,
}

impl FsObjectStore {
    /// Creates a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>, scheme: impl Into<String>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            scheme: scheme.into(),
        })
    }

    /// Resolves an object path to a local file, rejecting escapes from the root
    fn local_path(&self, bucket: &str, path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(path);
        let is_clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if path.is_empty() || bucket.is_empty() || !is_clean {
            return Err(StorageError::InvalidPath(format!("{}/{}", bucket, path)));
        }

        Ok(self.root.join(bucket).join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        let local = self.local_path(bucket, path)?;
        tokio::task::spawn_blocking(move || write_atomic(&local, &bytes))
            .await
            .map_err(|e| StorageError::Upload {
                path: path.to_string(),
                message: e.to_string(),
            })??;

        tracing::trace!("Stored {}/{} ({})", bucket, path, content_type);
        Ok(self.object_uri(bucket, path))
    }

    async fn object_exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        let local = self.local_path(bucket, path)?;
        Ok(tokio::fs::try_exists(local).await?)
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        let bucket_root = self.root.join(bucket);
        let prefix = prefix.to_string();

        let mut found = tokio::task::spawn_blocking(move || -> StorageResult<Vec<String>> {
            let mut found = Vec::new();
            if bucket_root.exists() {
                collect_files(&bucket_root, &bucket_root, &mut found)?;
            }
            Ok(found)
        })
        .await
        .map_err(|e| StorageError::Upload {
            path: bucket.to_string(),
            message: e.to_string(),
        })??;

        found.retain(|p| p.starts_with(&prefix));
        found.sort();
        Ok(found)
    }

    fn object_uri(&self, bucket: &str, path: &str) -> String {
        format!("{}://{}/{}", self.scheme, bucket, path)
    }
}

/// Walks a directory and records object paths relative to the bucket root
fn collect_files(root: &Path, dir: &Path, found: &mut Vec<String>) -> StorageResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();

        // In-progress atomic writes
        if name.to_string_lossy().ends_with(".tmp") {
            continue;
        }

        if entry.file_type()?.is_dir() {
            collect_files(root, &path, found)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            found.push(parts.join("/"));
        }
    }
    Ok(())
}
