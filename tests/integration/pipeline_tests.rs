//! End-to-end scrape runs against mock pages

use crate::common::{article_page, serve, test_config};
use corpus_harvester::config::Config;
use corpus_harvester::crawler::{Orchestrator, RunOptions};
use corpus_harvester::discovery::{Manifest, ManifestEntry};
use corpus_harvester::extract::{build_http_client, ExtractedDocument, FetchPolicy, HtmlExtractor};
use corpus_harvester::indexer::Uploader;
use corpus_harvester::state::{ProgressTracker, RunMode};
use corpus_harvester::storage::{FsObjectStore, ObjectStore};
use corpus_harvester::ErrorKind;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn manifest(uri: &str, keys: &[&str]) -> Manifest {
    Manifest::from_entries(keys.iter().map(|key| ManifestEntry {
        key: key.to_string(),
        url: format!("{}/{}/", uri, key),
        lastmod: None,
        origin_sitemap: format!("{}/post-sitemap.xml", uri),
        classification: "other".to_string(),
    }))
}

fn orchestrator(config: &Config, store: Option<Arc<FsObjectStore>>) -> Orchestrator {
    let client = build_http_client(&config.user_agent, config.scraper.request_timeout()).unwrap();
    let extractor = Arc::new(HtmlExtractor::new(
        client.clone(),
        &config.source,
        FetchPolicy::from_config(&config.scraper),
    ));
    let tracker = Arc::new(ProgressTracker::from_config(&config.storage));
    let orchestrator = Orchestrator::new(
        extractor,
        tracker,
        &config.scraper,
        config.storage.processed_dir(),
    );

    match store {
        Some(store) => orchestrator.with_uploader(Arc::new(Uploader::new(
            store,
            config.storage.bucket.clone(),
            client,
        ))),
        None => orchestrator,
    }
}

async fn serve_article(server: &MockServer, key: &str, title: &str) {
    serve(
        server,
        &format!("/{}/", key),
        article_page(&server.uri(), key, title),
        "text/html",
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("/wp-content/uploads/{}.png", key)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0x89, b'P', b'N', b'G'])
                .insert_header("content-type", "image/png"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_scrape_upload_and_resume() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(&uri, dir.path());

    serve_article(&server, "etomidate", "Etomidate").await;
    serve_article(&server, "ketamine", "Ketamine").await;
    // "retired" is not mounted and returns 404

    let manifest = manifest(&uri, &["etomidate", "ketamine", "retired"]);
    let store = Arc::new(
        FsObjectStore::new(config.storage.object_root.clone(), "gs").unwrap(),
    );

    let summary = orchestrator(&config, Some(store.clone()))
        .run(&manifest, RunOptions::new(RunMode::Normal, 2))
        .await
        .unwrap();

    assert_eq!(summary.dispatched, 3);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.errored, 1);
    assert_eq!(summary.images, 2);
    assert_eq!(summary.errors_by_kind.get(&ErrorKind::NotFound), Some(&1));

    let mut uploaded = summary.uploaded_uris.clone();
    uploaded.sort();
    assert_eq!(
        uploaded,
        vec![
            "gs://test-corpus/processed/etomidate.md".to_string(),
            "gs://test-corpus/processed/ketamine.md".to_string(),
        ]
    );
    assert!(store
        .object_exists("test-corpus", "images/etomidate/etomidate.png")
        .await
        .unwrap());
    assert!(store
        .object_exists("test-corpus", "metadata/ketamine.json")
        .await
        .unwrap());

    // Local artifacts: truncated at the share marker, noise stripped
    let processed = config.storage.processed_dir();
    let markdown = std::fs::read_to_string(processed.join("etomidate.md")).unwrap();
    assert!(markdown.starts_with("# Etomidate\n\nSource: [Test Source]"));
    assert!(markdown.contains("## Background"));
    assert!(!markdown.contains("Click to share"));
    assert!(!markdown.contains("never appear"));
    assert!(!markdown.contains("Home | About"));

    let sidecar: ExtractedDocument =
        serde_json::from_slice(&std::fs::read(processed.join("etomidate.json")).unwrap())
            .unwrap();
    assert_eq!(sidecar.author, "Dr Test");
    assert_eq!(sidecar.images.len(), 1);
    assert_eq!(sidecar.images[0].section_heading, "Background");

    let errors = std::fs::read_to_string(config.storage.errors_path()).unwrap();
    assert!(errors.contains("retired"));
    assert!(errors.contains("not_found"));

    // A resumed run only retries the failed entry
    let resumed = orchestrator(&config, Some(store))
        .run(&manifest, RunOptions::new(RunMode::Resume, 2))
        .await
        .unwrap();
    assert_eq!(resumed.dispatched, 1);
    assert_eq!(resumed.skipped, 2);
    assert_eq!(resumed.errored, 1);
}

#[tokio::test]
async fn test_hash_is_stable_across_runs() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(&uri, dir.path());
    serve_article(&server, "propofol", "Propofol").await;

    let manifest = manifest(&uri, &["propofol"]);
    let sidecar = config.storage.processed_dir().join("propofol.json");

    orchestrator(&config, None)
        .run(&manifest, RunOptions::new(RunMode::Normal, 1))
        .await
        .unwrap();
    let first: ExtractedDocument =
        serde_json::from_slice(&std::fs::read(&sidecar).unwrap()).unwrap();

    let summary = orchestrator(&config, None)
        .run(&manifest, RunOptions::new(RunMode::Force, 1))
        .await
        .unwrap();
    let second: ExtractedDocument =
        serde_json::from_slice(&std::fs::read(&sidecar).unwrap()).unwrap();

    assert_eq!(summary.dispatched, 1);
    assert!(summary.uploaded_uris.is_empty());
    assert_eq!(first.content_hash, second.content_hash);
}

#[tokio::test]
async fn test_soft_404_is_recorded_as_not_found() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let dir = TempDir::new().unwrap();
    let config = test_config(&uri, dir.path());

    serve(
        &server,
        "/moved/",
        "<html><head><title>Page not found - Test Source</title></head><body><p>Oops</p></body></html>"
            .to_string(),
        "text/html",
    )
    .await;

    let orchestrator = orchestrator(&config, None);
    let summary = orchestrator
        .run(&manifest(&uri, &["moved"]), RunOptions::new(RunMode::Normal, 1))
        .await
        .unwrap();

    assert_eq!(summary.errored, 1);
    assert_eq!(summary.errors_by_kind.get(&ErrorKind::NotFound), Some(&1));
    let state = orchestrator.tracker().snapshot();
    assert!(state.errors.contains_key("moved"));
    assert!(!config.storage.processed_dir().join("moved.md").exists());
}
