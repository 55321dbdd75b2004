use crate::config::types::{
    Config, ExtractConfig, IndexerConfig, ScraperConfig, SourceConfig, StorageBackend,
    StorageConfig, UserAgentConfig, MAX_IMPORT_BATCH,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Upper bound on the worker pool; the remote sites are small WordPress hosts
const MAX_WORKERS: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_user_agent_config(&config.user_agent)?;
    validate_source_config(&config.source)?;
    validate_extract_config(&config.source.extract)?;
    validate_scraper_config(&config.scraper)?;
    validate_storage_config(&config.storage)?;
    validate_indexer_config(&config.indexer)?;
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the source section
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    if config.name.is_empty()
        || !config
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "source name must be a non-empty identifier, got '{}'",
            config.name
        )));
    }

    validate_http_url("base_url", &config.base_url)?;
    validate_http_url("sitemap_index_url", &config.sitemap_index_url)?;

    if config.license.trim().is_empty() {
        return Err(ConfigError::Validation(
            "license cannot be empty".to_string(),
        ));
    }

    for rule in &config.classify {
        if rule.tag.trim().is_empty() {
            return Err(ConfigError::Validation(
                "classification tag cannot be empty".to_string(),
            ));
        }
        if rule.patterns.is_empty() {
            return Err(ConfigError::Validation(format!(
                "classification '{}' must have at least one pattern",
                rule.tag
            )));
        }
    }

    Ok(())
}

/// Validates extraction heuristics; every selector must parse
fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    if config.content_selectors.is_empty() {
        return Err(ConfigError::Validation(
            "content_selectors cannot be empty".to_string(),
        ));
    }

    for selector in config
        .content_selectors
        .iter()
        .chain(&config.title_selectors)
        .chain(&config.author_selectors)
        .chain(&config.strip_tags)
    {
        validate_selector(selector)?;
    }

    if config.content_end_markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "content_end_markers cannot contain empty strings".to_string(),
        ));
    }

    Ok(())
}

/// Validates bulk scrape settings
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.checkpoint_interval == 0 {
        return Err(ConfigError::Validation(
            "checkpoint_interval must be >= 1".to_string(),
        ));
    }

    if config.retry_base_ms > config.retry_max_ms {
        return Err(ConfigError::Validation(format!(
            "retry_base_ms ({}) cannot exceed retry_max_ms ({})",
            config.retry_base_ms, config.retry_max_ms
        )));
    }

    Ok(())
}

/// Validates storage layout
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    match config.backend {
        StorageBackend::Filesystem if config.object_root.as_os_str().is_empty() => {
            return Err(ConfigError::Validation(
                "object_root is required by the filesystem backend".to_string(),
            ));
        }
        StorageBackend::Gcs => validate_http_url("gcs_endpoint", &config.gcs_endpoint)?,
        StorageBackend::Filesystem => {}
    }

    if config.bucket.is_empty() || config.bucket.contains('/') {
        return Err(ConfigError::Validation(format!(
            "bucket must be a non-empty name without '/', got '{}'",
            config.bucket
        )));
    }

    if config.uri_scheme.is_empty() {
        return Err(ConfigError::Validation(
            "uri_scheme cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates remote import settings
fn validate_indexer_config(config: &IndexerConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 || config.batch_size > MAX_IMPORT_BATCH {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and {}, got {}",
            MAX_IMPORT_BATCH, config.batch_size
        )));
    }

    if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
        return Err(ConfigError::Validation(format!(
            "chunk_overlap ({}) must be smaller than a non-zero chunk_size ({})",
            config.chunk_overlap, config.chunk_size
        )));
    }

    if config.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    if config.max_wait_secs == 0 {
        return Err(ConfigError::Validation(
            "max_wait_secs must be >= 1".to_string(),
        ));
    }

    if config.enabled {
        validate_http_url("indexer endpoint", &config.endpoint)?;
        if config.corpus.is_empty() {
            return Err(ConfigError::Validation(
                "corpus cannot be empty when the indexer is enabled".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("x", "https://litfl.com/sitemap_index.xml").is_ok());
        assert!(validate_http_url("x", "http://127.0.0.1:8080/").is_ok());

        assert!(validate_http_url("x", "ftp://example.com/").is_err());
        assert!(validate_http_url("x", "not a url").is_err());
    }

    #[test]
    fn test_validate_selector() {
        assert!(validate_selector("article div.entry-content").is_ok());
        assert!(validate_selector("[class*=\"sharedaddy\"]").is_ok());
        assert!(validate_selector("div[[").is_err());
    }

    #[test]
    fn test_indexer_batch_size_bounds() {
        let mut config = IndexerConfig {
            enabled: false,
            ..IndexerConfig::default()
        };
        assert!(validate_indexer_config(&config).is_ok());

        config.batch_size = 26;
        assert!(validate_indexer_config(&config).is_err());

        config.batch_size = 0;
        assert!(validate_indexer_config(&config).is_err());
    }

    #[test]
    fn test_chunk_overlap_must_be_smaller() {
        let config = IndexerConfig {
            enabled: false,
            chunk_size: 200,
            chunk_overlap: 200,
            ..IndexerConfig::default()
        };
        assert!(validate_indexer_config(&config).is_err());
    }

    #[test]
    fn test_enabled_indexer_requires_endpoint() {
        let config = IndexerConfig::default();
        assert!(validate_indexer_config(&config).is_err());
    }

    #[test]
    fn test_storage_backend_requirements() {
        let mut config = StorageConfig {
            output_dir: "out".into(),
            backend: StorageBackend::Filesystem,
            object_root: "".into(),
            bucket: "litfl-corpus".to_string(),
            uri_scheme: "gs".to_string(),
            gcs_endpoint: "https://storage.googleapis.com".to_string(),
            access_token_env: "CORPUS_ACCESS_TOKEN".to_string(),
        };
        assert!(validate_storage_config(&config).is_err());

        // The GCS backend has no local object root
        config.backend = StorageBackend::Gcs;
        assert!(validate_storage_config(&config).is_ok());

        config.gcs_endpoint = "storage.googleapis.com".to_string();
        assert!(validate_storage_config(&config).is_err());
    }

    #[test]
    fn test_worker_bounds() {
        let mut config = ScraperConfig::default();
        assert!(validate_scraper_config(&config).is_ok());

        config.workers = 0;
        assert!(validate_scraper_config(&config).is_err());

        config.workers = MAX_WORKERS + 1;
        assert!(validate_scraper_config(&config).is_err());
    }
}
