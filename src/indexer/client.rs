//! Remote corpus client
//!
//! The corpus exposes three calls: start an import of object URIs, read the
//! state of a long-running operation, and list the files already indexed.

use crate::config::IndexerConfig;
use crate::indexer::IndexError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::debug;

/// Marker the corpus puts in a 400 body while another operation is running
pub const BUSY_MARKER: &str = "FAILED_PRECONDITION";

/// Page size used when listing indexed files
const LIST_PAGE_SIZE: u32 = 100;

/// How imported documents are split before indexing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkConfig {
    #[serde(rename = "chunkSize")]
    pub size: u32,
    #[serde(rename = "chunkOverlap")]
    pub overlap: u32,
}

impl ChunkConfig {
    pub fn from_config(config: &IndexerConfig) -> Self {
        Self {
            size: config.chunk_size,
            overlap: config.chunk_overlap,
        }
    }
}

/// Error reported by a finished operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Item counts of a finished import, when the corpus reports them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCounts {
    #[serde(default, alias = "importedRagFilesCount", deserialize_with = "flexible_count")]
    pub imported_count: u64,
    #[serde(default, alias = "failedRagFilesCount", deserialize_with = "flexible_count")]
    pub failed_count: u64,
    #[serde(default, alias = "skippedRagFilesCount", deserialize_with = "flexible_count")]
    pub skipped_count: u64,
}

/// State of a long-running operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<ImportCounts>,
}

/// Corpus resource as returned by a plain GET
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub update_time: Option<String>,
    #[serde(default)]
    pub corpus_status: Option<CorpusState>,
}

impl CorpusStatus {
    /// Lifecycle state reported by the service, e.g. "ACTIVE"
    pub fn state(&self) -> &str {
        self.corpus_status
            .as_ref()
            .map(|s| s.state.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("UNKNOWN")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CorpusState {
    #[serde(default)]
    pub state: String,
}

#[derive(Deserialize)]
struct OperationHandle {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFilesPage {
    #[serde(default)]
    rag_files: Vec<IndexedFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexedFile {
    #[serde(default)]
    display_name: String,
}

/// Counts arrive as JSON numbers or as decimal strings (int64 encoding)
fn flexible_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Remote indexing service
#[async_trait]
pub trait CorpusClient: Send + Sync {
    /// Starts an import and returns the operation name
    async fn import(&self, uris: &[String], chunk: &ChunkConfig) -> Result<String, IndexError>;

    async fn get_operation(&self, name: &str) -> Result<OperationStatus, IndexError>;

    /// Display names of every file already in the corpus
    async fn list_indexed(&self) -> Result<Vec<String>, IndexError>;
}

/// REST client for a corpus at `{endpoint}/{corpus}`
pub struct HttpCorpusClient {
    client: Client,
    endpoint: String,
    corpus: String,
    token: String,
}

impl HttpCorpusClient {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        corpus: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            corpus: corpus.into().trim_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Builds a client with the bearer token read from the configured variable
    pub fn from_config(client: Client, config: &IndexerConfig) -> Result<Self, IndexError> {
        let token = std::env::var(&config.access_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| IndexError::MissingToken(config.access_token_env.clone()))?;
        Ok(Self::new(client, &config.endpoint, &config.corpus, token))
    }

    /// Reads the corpus resource itself
    pub async fn corpus_status(&self) -> Result<CorpusStatus, IndexError> {
        let response = self
            .client
            .get(self.corpus_url())
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(classify_rejection(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| IndexError::Decode(e.to_string()))
    }

    fn corpus_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.corpus)
    }

    fn import_url(&self) -> String {
        format!("{}/{}/ragFiles:import", self.endpoint, self.corpus)
    }

    fn files_url(&self) -> String {
        format!("{}/{}/ragFiles", self.endpoint, self.corpus)
    }

    fn operation_url(&self, name: &str) -> String {
        format!("{}/{}", self.endpoint, name.trim_start_matches('/'))
    }
}

/// Maps a non-success import response onto the error taxonomy
pub fn classify_rejection(status: StatusCode, body: &str) -> IndexError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return IndexError::RateLimited;
    }
    let busy_status = matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED
    );
    if busy_status && body.contains(BUSY_MARKER) {
        return IndexError::CorpusBusy(truncate(body, 200));
    }
    IndexError::Rejected {
        status: status.as_u16(),
        body: truncate(body, 500),
    }
}

fn truncate(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}

fn transport(e: reqwest::Error) -> IndexError {
    IndexError::Transport(e.to_string())
}

#[async_trait]
impl CorpusClient for HttpCorpusClient {
    async fn import(&self, uris: &[String], chunk: &ChunkConfig) -> Result<String, IndexError> {
        let payload = json!({
            "importRagFilesConfig": {
                "gcsSource": { "uris": uris },
                "ragFileChunkingConfig": chunk,
            }
        });

        let response = self
            .client
            .post(self.import_url())
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(classify_rejection(status, &body));
        }

        let handle: OperationHandle =
            serde_json::from_str(&body).map_err(|e| IndexError::Decode(e.to_string()))?;
        debug!("Import accepted as {}", handle.name);
        Ok(handle.name)
    }

    async fn get_operation(&self, name: &str) -> Result<OperationStatus, IndexError> {
        let response = self
            .client
            .get(self.operation_url(name))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(classify_rejection(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| IndexError::Decode(e.to_string()))
    }

    async fn list_indexed(&self) -> Result<Vec<String>, IndexError> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.files_url())
                .bearer_auth(&self.token)
                .query(&[("pageSize", LIST_PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await.map_err(transport)?;
            let status = response.status();
            let body = response.text().await.map_err(transport)?;
            if !status.is_success() {
                return Err(classify_rejection(status, &body));
            }

            let page: ListFilesPage =
                serde_json::from_str(&body).map_err(|e| IndexError::Decode(e.to_string()))?;
            names.extend(
                page.rag_files
                    .into_iter()
                    .map(|f| f.display_name)
                    .filter(|n| !n.is_empty()),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(names)
    }
}
