//! HTTP fetcher implementation
//!
//! This module handles every page and sitemap request, including:
//! - Building the shared HTTP client with a proper user agent string
//! - GET requests with per-request timeouts
//! - Retry logic for transient failures and rate limits
//! - Error classification into [`ExtractionError`]

use crate::config::{ScraperConfig, UserAgentConfig};
use crate::crawler::RetryPolicy;
use crate::ExtractionError;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry schedules applied to one fetch
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub transient: RetryPolicy,
    pub rate_limited: RetryPolicy,
}

impl FetchPolicy {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            transient: RetryPolicy::transient(config),
            rate_limited: RetryPolicy::rate_limited(config),
        }
    }

    /// Single attempt, no waiting; used by tests and one-off fetches
    pub fn no_retry() -> Self {
        let once = RetryPolicy::new(Duration::ZERO, Duration::ZERO, 1);
        Self {
            transient: once,
            rate_limited: once,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use corpus_harvester::config::UserAgentConfig;
/// use corpus_harvester::extract::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "CorpusHarvester".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL as text with retry logic
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 404 | Immediate → NotFound |
/// | HTTP 429 | Retry with the rate-limit backoff |
/// | HTTP 5xx | Retry with the transient backoff |
/// | Timeout / connection error | Retry with the transient backoff |
/// | Other non-2xx | Immediate → HttpStatus |
///
/// The error from the last attempt is returned once the attempts run out.
pub async fn fetch_text(
    client: &Client,
    url: &str,
    policy: &FetchPolicy,
) -> Result<String, ExtractionError> {
    let mut attempts = 0u32;
    let mut rate_limited_retries = 0u32;
    let mut transient_retries = 0u32;

    loop {
        attempts += 1;
        let error = match fetch_once(client, url).await {
            Ok(body) => return Ok(body),
            Err(e) => e,
        };

        let (schedule, retry) = match &error {
            ExtractionError::RateLimited { .. } => {
                rate_limited_retries += 1;
                (&policy.rate_limited, rate_limited_retries - 1)
            }
            ExtractionError::TransientNetwork { .. } => {
                transient_retries += 1;
                (&policy.transient, transient_retries - 1)
            }
            ExtractionError::HttpStatus { status, .. } if *status >= 500 => {
                transient_retries += 1;
                (&policy.transient, transient_retries - 1)
            }
            _ => return Err(error),
        };

        if !schedule.allows_another(attempts) {
            warn!("Giving up on {} after {} attempts: {}", url, attempts, error);
            return Err(error);
        }

        let delay = schedule.delay_for(retry);
        debug!("Retrying {} in {:?} after: {}", url, delay, error);
        tokio::time::sleep(delay).await;
    }
}

async fn fetch_once(client: &Client, url: &str) -> Result<String, ExtractionError> {
    let response = client.get(url).send().await.map_err(|e| {
        let message = if e.is_timeout() {
            "Request timeout".to_string()
        } else if e.is_connect() {
            "Connection refused".to_string()
        } else {
            e.to_string()
        };
        ExtractionError::TransientNetwork {
            url: url.to_string(),
            message,
        }
    })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ExtractionError::NotFound {
            url: url.to_string(),
        });
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ExtractionError::RateLimited {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(ExtractionError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|e| ExtractionError::TransientNetwork {
            url: url.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn fast_policy(attempts: u32) -> FetchPolicy {
        let policy = RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(5), attempts);
        FetchPolicy {
            transient: policy,
            rate_limited: policy,
        }
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_config();
        let client = build_http_client(&config, Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let client = build_http_client(&create_test_config(), Duration::from_secs(5)).unwrap();
        let body = fetch_text(&client, &format!("{}/page/", server.uri()), &fast_policy(3))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_404_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_http_client(&create_test_config(), Duration::from_secs(5)).unwrap();
        let err = fetch_text(&client, &format!("{}/gone/", server.uri()), &fast_policy(4))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = build_http_client(&create_test_config(), Duration::from_secs(5)).unwrap();
        let err = fetch_text(&client, &format!("{}/flaky/", server.uri()), &fast_policy(3))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransientNetwork);
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
            .mount(&server)
            .await;

        let client = build_http_client(&create_test_config(), Duration::from_secs(5)).unwrap();
        let body = fetch_text(&client, &format!("{}/busy/", server.uri()), &fast_policy(4))
            .await
            .unwrap();
        assert_eq!(body, "finally");
    }

    #[tokio::test]
    async fn test_forbidden_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_http_client(&create_test_config(), Duration::from_secs(5)).unwrap();
        let err = fetch_text(&client, &format!("{}/private/", server.uri()), &fast_policy(4))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::HttpStatus { status: 403, .. }));
    }
}
