//! Object storage uploads for extracted documents

use crate::extract::ExtractedDocument;
use crate::storage::{document_path, image_path, metadata_path, ObjectStore, StorageError};
use crate::url::filename_from_url;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// An image re-hosted next to its document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedImage {
    pub uri: String,
    pub original_url: String,
    pub alt: String,
    pub label: String,
    pub caption: Option<String>,
    pub section: String,
}

/// Everything written for one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    pub document_uri: String,
    pub metadata_uri: Option<String>,
    pub images: Vec<HostedImage>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageMetadata<'a> {
    key: &'a str,
    title: &'a str,
    source: &'a str,
    license: &'a str,
    attribution: &'a str,
    images: &'a [HostedImage],
}

/// Writes documents and their images to object storage
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    client: Client,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, client: Client) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            client,
        }
    }

    /// Uploads the document body and returns its canonical URI
    pub async fn upload_document(
        &self,
        doc: &ExtractedDocument,
        markdown: &str,
    ) -> Result<String, StorageError> {
        let path = document_path(&doc.key);
        self.store
            .put_object(&self.bucket, &path, markdown.as_bytes().to_vec(), "text/markdown")
            .await
    }

    /// Downloads every image from its original URL and re-hosts it under
    /// `images/{key}/`
    ///
    /// A failed image is logged and skipped; the document still uploads.
    pub async fn rehost_images(&self, doc: &ExtractedDocument) -> Vec<HostedImage> {
        let mut hosted = Vec::with_capacity(doc.images.len());
        let mut used_names = HashSet::new();

        for (i, image) in doc.images.iter().enumerate() {
            let Some(filename) = Url::parse(&image.url)
                .ok()
                .and_then(|url| filename_from_url(&url))
            else {
                warn!("Skipping image without a filename: {}", image.url);
                continue;
            };
            let filename = if used_names.insert(filename.clone()) {
                filename
            } else {
                format!("{}-{}", i, filename)
            };

            match self.download(&image.url).await {
                Ok((bytes, content_type)) => {
                    let path = image_path(&doc.key, &filename);
                    match self
                        .store
                        .put_object(&self.bucket, &path, bytes, &content_type)
                        .await
                    {
                        Ok(uri) => hosted.push(HostedImage {
                            uri,
                            original_url: image.url.clone(),
                            alt: image.alt.clone(),
                            label: image.label.clone(),
                            caption: image.caption.clone(),
                            section: image.section_heading.clone(),
                        }),
                        Err(e) => warn!("Failed to store image {}: {}", image.url, e),
                    }
                }
                Err(e) => warn!("Failed to download image {}: {}", image.url, e),
            }
        }

        debug!(
            "Re-hosted {}/{} images for {}",
            hosted.len(),
            doc.images.len(),
            doc.key
        );
        hosted
    }

    /// Uploads `metadata/{key}.json` describing the re-hosted images
    pub async fn upload_metadata(
        &self,
        doc: &ExtractedDocument,
        images: &[HostedImage],
    ) -> Result<String, StorageError> {
        let metadata = ImageMetadata {
            key: &doc.key,
            title: &doc.title,
            source: &doc.url,
            license: &doc.license,
            attribution: &doc.attribution,
            images,
        };
        let bytes = serde_json::to_vec_pretty(&metadata)?;
        self.store
            .put_object(&self.bucket, &metadata_path(&doc.key), bytes, "application/json")
            .await
    }

    /// Re-hosts images, then uploads the metadata object and the document
    ///
    /// The metadata object is only written when at least one image was hosted.
    pub async fn upload(
        &self,
        doc: &ExtractedDocument,
        markdown: &str,
    ) -> Result<UploadReceipt, StorageError> {
        let images = self.rehost_images(doc).await;
        let metadata_uri = if images.is_empty() {
            None
        } else {
            Some(self.upload_metadata(doc, &images).await?)
        };
        let document_uri = self.upload_document(doc, markdown).await?;

        Ok(UploadReceipt {
            document_uri,
            metadata_uri,
            images,
        })
    }

    async fn download(&self, url: &str) -> Result<(Vec<u8>, String), reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(url).to_string());
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }
}

/// Content type from a file extension, for servers that omit the header
pub fn guess_content_type(url: &str) -> &'static str {
    let lowered = url.to_lowercase();
    let ext = lowered.rsplit('.').next().unwrap_or("");
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
