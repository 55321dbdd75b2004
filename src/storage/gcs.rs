//! Google Cloud Storage backend over the JSON API

use crate::config::StorageConfig;
use crate::storage::traits::{ObjectStore, StorageError, StorageResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ObjectItem {
    name: String,
}

/// Object store writing to `gs://bucket/path` through `{endpoint}/storage/v1`
pub struct GcsObjectStore {
    client: Client,
    endpoint: String,
    token: String,
}

impl GcsObjectStore {
    pub fn new(client: Client, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Builds a store with the bearer token read from the configured variable
    pub fn from_config(client: Client, config: &StorageConfig) -> StorageResult<Self> {
        let token = std::env::var(&config.access_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| StorageError::MissingToken(config.access_token_env.clone()))?;
        Ok(Self::new(client, &config.gcs_endpoint, token))
    }

    /// `{endpoint}/{base}/b/{bucket}/o[/{object}]`, each name a single escaped segment
    fn object_url(&self, base: &[&str], bucket: &str, object: Option<&str>) -> StorageResult<Url> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| StorageError::InvalidPath(format!("{}: {}", self.endpoint, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidPath(self.endpoint.clone()))?;
            segments.pop_if_empty();
            segments.extend(base);
            segments.extend(["b", bucket, "o"]);
            if let Some(object) = object {
                segments.push(object);
            }
        }
        Ok(url)
    }

    async fn request_failed(path: &str, response: reqwest::Response) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        StorageError::Request {
            path: path.to_string(),
            message: format!("HTTP {}: {}", status, body.chars().take(300).collect::<String>()),
        }
    }
}

fn request_error(path: &str, e: reqwest::Error) -> StorageError {
    StorageError::Request {
        path: path.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        let url = self.object_url(&["upload", "storage", "v1"], bucket, None)?;
        let size = bytes.len();

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .query(&[("uploadType", "media"), ("name", path)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Upload {
                path: path.to_string(),
                message: format!("HTTP {}: {}", status, body.chars().take(300).collect::<String>()),
            });
        }

        trace!("Uploaded {}/{} ({} bytes, {})", bucket, path, size, content_type);
        Ok(self.object_uri(bucket, path))
    }

    async fn object_exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        let url = self.object_url(&["storage", "v1"], bucket, Some(path))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| request_error(path, e))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::request_failed(path, response).await),
        }
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        let url = self.object_url(&["storage", "v1"], bucket, None)?;
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(url.clone())
                .bearer_auth(&self.token)
                .query(&[("prefix", prefix)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await.map_err(|e| request_error(bucket, e))?;
            match response.status() {
                status if status.is_success() => {}
                StatusCode::NOT_FOUND => return Err(StorageError::NotFound(bucket.to_string())),
                _ => return Err(Self::request_failed(bucket, response).await),
            }

            let page: ObjectList = response.json().await.map_err(|e| request_error(bucket, e))?;
            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} objects under {}/{}", names.len(), bucket, prefix);
        names.sort();
        Ok(names)
    }

    fn object_uri(&self, bucket: &str, path: &str) -> String {
        format!("gs://{}/{}", bucket, path)
    }
}
