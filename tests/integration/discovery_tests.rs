//! Sitemap discovery against a mock source

use crate::common::{serve, sitemap_index, test_config, urlset};
use corpus_harvester::discovery::{discover_and_save, Discover, Manifest, SitemapDiscoverer};
use corpus_harvester::extract::{build_http_client, FetchPolicy};
use corpus_harvester::HarvestError;
use tempfile::TempDir;
use wiremock::MockServer;

fn keys(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("article-{}", i)).collect()
}

#[tokio::test]
async fn test_overlapping_sitemaps_dedup_to_twenty() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(&uri, dir.path());

    serve(
        &server,
        "/sitemap_index.xml",
        sitemap_index(
            &uri,
            &["/post-sitemap.xml", "/page-sitemap.xml", "/missing-sitemap.xml"],
        ),
        "application/xml",
    )
    .await;
    // 20 posts, then 10 pages that repeat the last 10 posts: 30 URLs in total
    serve(&server, "/post-sitemap.xml", urlset(&uri, &keys(0..20)), "application/xml").await;
    serve(&server, "/page-sitemap.xml", urlset(&uri, &keys(10..20)), "application/xml").await;
    // missing-sitemap.xml is not mounted and returns 404

    let client = build_http_client(&config.user_agent, config.scraper.request_timeout()).unwrap();
    let discoverer = SitemapDiscoverer::new(client, &config.source, FetchPolicy::no_retry());
    let (manifest, summary) =
        discover_and_save(&discoverer, &config.source.sitemap_index_url, &config.storage)
            .await
            .unwrap();

    assert_eq!(manifest.len(), 20);
    assert_eq!(manifest.total_unique, 20);
    let overlapping = manifest.get("article-15").unwrap();
    assert!(overlapping.origin_sitemap.ends_with("/post-sitemap.xml"));
    assert_eq!(summary.by_origin.len(), 1);
    assert_eq!(summary.by_year.get("2023"), Some(&20));

    let reloaded = Manifest::load(&config.storage.manifest_path()).unwrap();
    assert_eq!(reloaded.entries, manifest.entries);
    assert!(config.storage.classification_summary_path().exists());
}

#[tokio::test]
async fn test_skip_and_classification_rules() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(&uri, dir.path());

    let xml = format!(
        r#"<urlset>
<url><loc>{uri}/</loc></url>
<url><loc>{uri}/tag/cardiology/</loc></url>
<url><loc>{uri}/wp-content/uploads/x.png</loc></url>
<url><loc>{uri}/brugada-ecg/</loc></url>
<url><loc>{uri}/etomidate/</loc></url>
</urlset>"#,
        uri = uri
    );
    serve(&server, "/sitemap_index.xml", xml, "application/xml").await;

    let client = build_http_client(&config.user_agent, config.scraper.request_timeout()).unwrap();
    let discoverer = SitemapDiscoverer::new(client, &config.source, FetchPolicy::no_retry());
    let manifest = discoverer
        .discover(&config.source.sitemap_index_url)
        .await
        .unwrap();

    let keys: Vec<&str> = manifest.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["brugada-ecg", "etomidate"]);
    assert_eq!(manifest.get("brugada-ecg").unwrap().classification, "ecg_library");
    assert_eq!(manifest.get("etomidate").unwrap().classification, "other");
}

#[tokio::test]
async fn test_unreachable_index_is_fatal() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(&uri, dir.path());

    let client = build_http_client(&config.user_agent, config.scraper.request_timeout()).unwrap();
    let discoverer = SitemapDiscoverer::new(client, &config.source, FetchPolicy::no_retry());
    let result = discoverer.discover(&config.source.sitemap_index_url).await;

    assert!(matches!(result, Err(HarvestError::SitemapIndex { .. })));
    assert!(!config.storage.manifest_path().exists());
}
