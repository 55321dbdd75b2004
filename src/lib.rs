//! Corpus-Harvester: a resumable sitemap-to-corpus acquisition engine
//!
//! This crate discovers article pages from a source's sitemaps, extracts
//! structured sections and images from each page, scrapes them concurrently
//! under a fixed request pace, persists resumable progress, and batch-imports
//! the extracted documents into a remote search corpus.

pub mod config;
pub mod crawler;
pub mod discovery;
pub mod extract;
pub mod indexer;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use std::fmt;
use thiserror::Error;

/// Main error type for fatal Corpus-Harvester failures
///
/// Anything surfaced through this type aborts the run. Page-level failures are
/// carried by [`ExtractionError`] and recorded in the progress state instead.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Indexer error: {0}")]
    Index(#[from] indexer::IndexError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to fetch sitemap index {url}: {message}")]
    SitemapIndex { url: String, message: String },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
}

/// Closed classification of page-level and indexer failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeout, connection reset, 5xx
    TransientNetwork,
    /// HTTP 429
    RateLimit,
    /// Remote corpus already running a mutating operation
    ConcurrentOperation,
    /// Markup could not be interpreted
    Parse,
    /// Page had no content left after noise stripping
    EmptyContent,
    /// HTTP 404 or a soft-404 page
    NotFound,
    /// Local persistence or object upload failed
    Storage,
}

impl ErrorKind {
    /// Returns true if a bounded retry with backoff is appropriate
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork | Self::RateLimit | Self::ConcurrentOperation
        )
    }

    /// Returns true if the failure says nothing about the health of the run
    pub fn is_systemic(&self) -> bool {
        !matches!(self, Self::NotFound)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient_network",
            Self::RateLimit => "rate_limit",
            Self::ConcurrentOperation => "concurrent_operation",
            Self::Parse => "parse",
            Self::EmptyContent => "empty_content",
            Self::NotFound => "not_found",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single manifest entry's pipeline
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("Network error for {url}: {message}")]
    TransientNetwork { url: String, message: String },

    #[error("Rate limited fetching {url}")]
    RateLimited { url: String },

    #[error("Page not found: {url}")]
    NotFound { url: String },

    #[error("Soft 404 at {url}: {title}")]
    SoftNotFound { url: String, title: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("No content extracted from {url}")]
    EmptyContent { url: String },

    #[error("Failed to persist {key}: {message}")]
    Persist { key: String, message: String },
}

impl ExtractionError {
    /// Maps the error onto the closed taxonomy used for reporting and retries
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientNetwork { .. } => ErrorKind::TransientNetwork,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::NotFound { .. } | Self::SoftNotFound { .. } => ErrorKind::NotFound,
            Self::HttpStatus { status, .. } if *status >= 500 => ErrorKind::TransientNetwork,
            Self::HttpStatus { .. } | Self::Parse { .. } => ErrorKind::Parse,
            Self::EmptyContent { .. } => ErrorKind::EmptyContent,
            Self::Persist { .. } => ErrorKind::Storage,
        }
    }
}

/// Result type alias for fatal Corpus-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Orchestrator, RunSummary};
pub use discovery::{Manifest, ManifestEntry};
pub use extract::{ExtractedDocument, HtmlExtractor};
pub use state::{ProgressTracker, RunMode};
