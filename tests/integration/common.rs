//! Shared fixtures for the integration tests

use corpus_harvester::config::{parse_config, Config};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a validated configuration pointing every URL at the mock server
pub fn test_config(server_uri: &str, dir: &Path) -> Config {
    let content = format!(
        r#"
[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[source]
name = "test-source"
label = "Test Source"
base-url = "{uri}"
sitemap-index-url = "{uri}/sitemap_index.xml"
license = "CC BY 4.0"

[[source.classify]]
tag = "ecg_library"
patterns = ["*-ecg"]

[source.extract]
content-end-markers = ["Click to share"]

[scraper]
workers = 3
request-delay-ms = 0
request-timeout-secs = 5
max-retries = 1
retry-base-ms = 1
rate-limit-base-ms = 1
retry-max-ms = 5
checkpoint-interval = 2

[storage]
output-dir = "{out}"
object-root = "{objects}"
bucket = "test-corpus"

[indexer]
endpoint = "{uri}/v1"
corpus = "projects/test/locations/us/ragCorpora/1"
access-token-env = "HARVESTER_TEST_TOKEN"
max-attempts = 5
rate-limit-base-ms = 1
busy-base-ms = 1
max-backoff-ms = 10
poll-interval-ms = 5
slow-poll-interval-ms = 10
slow-poll-after-secs = 1
max-wait-secs = 2
batch-settle-ms = 0
"#,
        uri = server_uri,
        out = dir.join("out").display(),
        objects = dir.join("objects").display(),
    );

    parse_config(&content).expect("test config should be valid")
}

/// A sitemap `<urlset>` listing `{uri}/{key}/` for every key
pub fn urlset(server_uri: &str, keys: &[String]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
    );
    for key in keys {
        xml.push_str(&format!(
            "<url><loc>{}/{}/</loc><lastmod>2023-05-01T10:00:00+00:00</lastmod></url>",
            server_uri, key
        ));
    }
    xml.push_str("</urlset>");
    xml
}

/// A sitemap index listing the given sitemap paths
pub fn sitemap_index(server_uri: &str, sitemaps: &[&str]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
    );
    for sitemap in sitemaps {
        xml.push_str(&format!(
            "<sitemap><loc>{}{}</loc></sitemap>",
            server_uri, sitemap
        ));
    }
    xml.push_str("</sitemapindex>");
    xml
}

/// A WordPress-style article page with one image and trailing share buttons
pub fn article_page(server_uri: &str, key: &str, title: &str) -> String {
    format!(
        r#"<html><head><title>{title} - Test Source</title>
<meta name="author" content="Dr Test"></head><body>
<nav>Home | About | Contact</nav>
<article><h1 class="entry-title">{title}</h1>
<div class="entry-content">
  <p>{title} is described here in enough words to clear the minimum container length threshold.</p>
  <h2>Background</h2>
  <p>Background text for {title}.</p>
  <figure><img src="{uri}/wp-content/uploads/{key}.png" alt="{title} diagram"><figcaption>{title} diagram</figcaption></figure>
  <div class="sharedaddy"><p>Share this</p></div>
  <p>Click to share on Twitter</p>
  <p>Related posts should never appear</p>
</div></article></body></html>"#,
        uri = server_uri,
        key = key,
        title = title
    )
}

/// Mounts a 200 response with the given body at `route`
pub async fn serve(server: &MockServer, route: &str, body: String, content_type: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", content_type),
        )
        .mount(server)
        .await;
}
