use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Corpus-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// One content source plugged into the engine
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Short identifier, used in object paths and attribution
    pub name: String,

    /// Human readable label used in the attribution line
    #[serde(default)]
    pub label: Option<String>,

    /// Site root, e.g. "https://litfl.com"
    pub base_url: String,

    /// Sitemap index (or a plain urlset) to discover pages from
    pub sitemap_index_url: String,

    /// Substrings selecting nested sitemaps; empty keeps all of them
    #[serde(default)]
    pub sitemap_include: Vec<String>,

    /// Key substrings that mark non-content pages
    #[serde(default = "default_skip_patterns")]
    pub skip_patterns: Vec<String>,

    /// License string carried on every document
    pub license: String,

    /// Ordered classification rules; the first match wins
    #[serde(default)]
    pub classify: Vec<ClassifyRule>,

    #[serde(default)]
    pub extract: ExtractConfig,
}

impl SourceConfig {
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Maps key patterns to a content-type tag
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyRule {
    pub tag: String,
    /// Wildcard patterns (`*` matches any run of characters)
    pub patterns: Vec<String>,
}

/// Per-source markup heuristics
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractConfig {
    /// Main content container selectors, most specific first
    #[serde(default = "default_content_selectors")]
    pub content_selectors: Vec<String>,

    #[serde(default = "default_title_selectors")]
    pub title_selectors: Vec<String>,

    #[serde(default)]
    pub author_selectors: Vec<String>,

    /// Elements removed wherever they appear in the container
    #[serde(default = "default_strip_tags")]
    pub strip_tags: Vec<String>,

    /// Class substrings of noise regions (share widgets, comment forms, ads)
    #[serde(default = "default_strip_classes")]
    pub strip_classes: Vec<String>,

    #[serde(default = "default_strip_ids")]
    pub strip_ids: Vec<String>,

    /// Boilerplate strings that mark the end of genuine article content
    #[serde(default)]
    pub content_end_markers: Vec<String>,

    /// Lowercase title fragments identifying an error page served with 200
    #[serde(default = "default_soft_404_markers")]
    pub soft_404_markers: Vec<String>,

    /// URL fragments of logos, trackers and other non-content images
    #[serde(default)]
    pub image_filter_patterns: Vec<String>,

    /// Images declaring a smaller width are treated as icons
    #[serde(default = "default_min_image_width")]
    pub min_image_width: u32,

    /// Fallback containers with less text than this are ignored
    #[serde(default = "default_min_container_chars")]
    pub min_container_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            content_selectors: default_content_selectors(),
            title_selectors: default_title_selectors(),
            author_selectors: Vec::new(),
            strip_tags: default_strip_tags(),
            strip_classes: default_strip_classes(),
            strip_ids: default_strip_ids(),
            content_end_markers: Vec::new(),
            soft_404_markers: default_soft_404_markers(),
            image_filter_patterns: Vec::new(),
            min_image_width: default_min_image_width(),
            min_container_chars: default_min_container_chars(),
        }
    }
}

/// Bulk scrape behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScraperConfig {
    /// Size of the worker pool
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fixed delay between dispatches (milliseconds)
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries for transient page fetch failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    #[serde(default = "default_rate_limit_base_ms")]
    pub rate_limit_base_ms: u64,

    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Progress is saved every N finished entries
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// How long in-flight work may run after an interrupt
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl ScraperConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            request_delay_ms: default_request_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            rate_limit_base_ms: default_rate_limit_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            checkpoint_interval: default_checkpoint_interval(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// Local output and object storage layout
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Manifest, progress, errors and processed documents live here
    pub output_dir: PathBuf,

    /// Where uploaded objects go
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory of the filesystem object store
    #[serde(default)]
    pub object_root: PathBuf,

    pub bucket: String,

    #[serde(default = "default_uri_scheme")]
    pub uri_scheme: String,

    /// GCS JSON API root
    #[serde(default = "default_gcs_endpoint")]
    pub gcs_endpoint: String,

    /// Environment variable holding the bearer token for the GCS backend
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
}

/// Object store implementation selected by `[storage] backend`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// A local directory tree under `object-root`
    #[default]
    Filesystem,
    /// Google Cloud Storage through its JSON API
    Gcs,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            backend: StorageBackend::default(),
            object_root: PathBuf::from("output/objects"),
            bucket: String::new(),
            uri_scheme: default_uri_scheme(),
            gcs_endpoint: default_gcs_endpoint(),
            access_token_env: default_access_token_env(),
        }
    }
}

impl StorageConfig {
    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join("manifest.json")
    }

    pub fn classification_summary_path(&self) -> PathBuf {
        self.output_dir.join("classification_summary.json")
    }

    pub fn progress_path(&self) -> PathBuf {
        self.output_dir.join("progress.json")
    }

    pub fn errors_path(&self) -> PathBuf {
        self.output_dir.join("errors.json")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.output_dir.join("processed")
    }
}

/// Remote corpus import behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexerConfig {
    /// Set to false to scrape without importing
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API root, e.g. "https://us-west4-aiplatform.googleapis.com/v1beta1"
    #[serde(default)]
    pub endpoint: String,

    /// Corpus resource name
    #[serde(default)]
    pub corpus: String,

    /// Environment variable holding the bearer token
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_rate_limit_base_ms_indexer")]
    pub rate_limit_base_ms: u64,

    #[serde(default = "default_busy_base_ms")]
    pub busy_base_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_slow_poll_interval_ms")]
    pub slow_poll_interval_ms: u64,

    #[serde(default = "default_slow_poll_after_secs")]
    pub slow_poll_after_secs: u64,

    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Pause after a resolved batch before submitting the next one
    #[serde(default = "default_batch_settle_ms")]
    pub batch_settle_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            corpus: String::new(),
            access_token_env: default_access_token_env(),
            batch_size: default_batch_size(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_attempts: default_max_attempts(),
            rate_limit_base_ms: default_rate_limit_base_ms_indexer(),
            busy_base_ms: default_busy_base_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            slow_poll_interval_ms: default_slow_poll_interval_ms(),
            slow_poll_after_secs: default_slow_poll_after_secs(),
            max_wait_secs: default_max_wait_secs(),
            batch_settle_ms: default_batch_settle_ms(),
        }
    }
}

/// Hard limit of URIs per import call imposed by the remote service
pub const MAX_IMPORT_BATCH: usize = 25;

fn default_true() -> bool {
    true
}

fn default_skip_patterns() -> Vec<String> {
    [
        "wp-content",
        "wp-admin",
        "wp-login",
        "feed",
        "comments",
        "author/",
        "category/",
        "tag/",
        "page/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_content_selectors() -> Vec<String> {
    vec![
        "article div.entry-content".to_string(),
        "div.entry-content".to_string(),
        "main".to_string(),
        "article".to_string(),
    ]
}

fn default_title_selectors() -> Vec<String> {
    vec!["h1.page-title".to_string(), "h1.entry-title".to_string()]
}

fn default_strip_tags() -> Vec<String> {
    ["noscript", "script", "style", "nav", "form", "iframe"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_strip_classes() -> Vec<String> {
    [
        "sharedaddy",
        "jp-relatedposts",
        "comment-respond",
        "comments-area",
        "author-box",
        "advads",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_strip_ids() -> Vec<String> {
    vec!["comments".to_string(), "respond".to_string()]
}

fn default_soft_404_markers() -> Vec<String> {
    vec!["page not found".to_string(), "can't be found".to_string()]
}

fn default_min_image_width() -> u32 {
    50
}

fn default_min_container_chars() -> usize {
    100
}

fn default_workers() -> usize {
    3
}

fn default_request_delay_ms() -> u64 {
    1500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    1000
}

fn default_rate_limit_base_ms() -> u64 {
    5000
}

fn default_retry_max_ms() -> u64 {
    60_000
}

fn default_checkpoint_interval() -> usize {
    25
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_uri_scheme() -> String {
    "gs".to_string()
}

fn default_gcs_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_access_token_env() -> String {
    "CORPUS_ACCESS_TOKEN".to_string()
}

fn default_batch_size() -> usize {
    MAX_IMPORT_BATCH
}

fn default_chunk_size() -> u32 {
    1024
}

fn default_chunk_overlap() -> u32 {
    200
}

fn default_max_attempts() -> u32 {
    8
}

fn default_rate_limit_base_ms_indexer() -> u64 {
    2000
}

fn default_busy_base_ms() -> u64 {
    3000
}

fn default_max_backoff_ms() -> u64 {
    90_000
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_slow_poll_interval_ms() -> u64 {
    15_000
}

fn default_slow_poll_after_secs() -> u64 {
    60
}

fn default_max_wait_secs() -> u64 {
    300
}

fn default_batch_settle_ms() -> u64 {
    8000
}
