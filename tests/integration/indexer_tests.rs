//! Corpus import against a mock indexing endpoint

use crate::common::test_config;
use corpus_harvester::config::Config;
use corpus_harvester::indexer::{
    pending_document_uris, validate_index, BatchImporter, ChunkConfig, CorpusClient,
    HttpCorpusClient, ImportSettings, IndexError,
};
use corpus_harvester::state::BatchState;
use corpus_harvester::storage::{FsObjectStore, ObjectStore};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CORPUS: &str = "projects/test/locations/us/ragCorpora/1";

fn corpus_client(server: &MockServer) -> HttpCorpusClient {
    HttpCorpusClient::new(
        reqwest::Client::new(),
        format!("{}/v1", server.uri()),
        CORPUS,
        "test-token",
    )
}

fn import_path() -> String {
    format!("/v1/{}/ragFiles:import", CORPUS)
}

fn importer(server: &MockServer, config: &Config) -> BatchImporter {
    BatchImporter::new(
        Arc::new(corpus_client(server)),
        ImportSettings::from_config(&config.indexer),
    )
}

fn uris(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("gs://test-corpus/processed/doc-{}.md", i))
        .collect()
}

async fn mount_done_operation(server: &MockServer, operation: &str, imported: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", operation)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": operation,
            "done": true,
            "response": { "importedRagFilesCount": imported }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_rate_limited_import_retries_then_succeeds() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(path(import_path()))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(import_path()))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "importRagFilesConfig": {
                "ragFileChunkingConfig": { "chunkSize": 1024 }
            }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "projects/test/operations/op-1" })),
        )
        .mount(&server)
        .await;

    let importer = importer(&server, &config);
    let (result, report) = importer
        .import_batch(&uris(3), &ChunkConfig::from_config(&config.indexer))
        .await;

    assert_eq!(result.unwrap(), "projects/test/operations/op-1");
    assert_eq!(report.attempts, 4);
    assert_eq!(report.retries(), 3);
    assert!(report.delays.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_busy_corpus_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(path(import_path()))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "status": "FAILED_PRECONDITION",
                "message": "There are other operations running on the RagCorpus"
            }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(import_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "projects/test/operations/op-2" })),
        )
        .mount(&server)
        .await;
    mount_done_operation(&server, "projects/test/operations/op-2", "2").await;

    let summary = importer(&server, &config).import_all(&uris(2)).await;

    assert_eq!(summary.count(BatchState::Done), 1);
    assert_eq!(summary.imported(), 2);
    assert_eq!(summary.batches[0].submit.attempts, 2);
}

#[tokio::test]
async fn test_rejected_batch_does_not_block_the_next() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());

    Mock::given(method("POST"))
        .and(path(import_path()))
        .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(import_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "projects/test/operations/op-3" })),
        )
        .mount(&server)
        .await;
    mount_done_operation(&server, "projects/test/operations/op-3", "5").await;

    // 30 URIs split into batches of 25 and 5
    let summary = importer(&server, &config).import_all(&uris(30)).await;

    assert_eq!(summary.batches.len(), 2);
    assert_eq!(summary.batches[0].state, BatchState::Failed);
    assert_eq!(summary.batches[0].submit.attempts, 1);
    assert_eq!(summary.batches[1].state, BatchState::Done);
    assert_eq!(summary.batches[1].size, 5);
    assert_eq!(summary.submitted_uris(), 30);
}

#[tokio::test]
async fn test_operation_polls_until_done() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let operation = "projects/test/operations/op-4";

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", operation)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": operation })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_done_operation(&server, operation, "7").await;

    let outcome = importer(&server, &config)
        .poll_until_done(operation, std::time::Duration::from_secs(2))
        .await;

    match outcome {
        corpus_harvester::indexer::PollOutcome::Done(Some(counts)) => {
            assert_eq!(counts.imported_count, 7)
        }
        other => panic!("expected a finished import, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_indexed_follows_pages() {
    let server = MockServer::start().await;
    let files_path = format!("/v1/{}/ragFiles", CORPUS);

    Mock::given(method("GET"))
        .and(path(files_path.clone()))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ragFiles": [{ "displayName": "ketamine.md" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(files_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ragFiles": [{ "displayName": "etomidate.md" }, { "displayName": "" }],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let names = corpus_client(&server).list_indexed().await.unwrap();
    assert_eq!(names, vec!["etomidate.md".to_string(), "ketamine.md".to_string()]);
}

#[tokio::test]
async fn test_pending_documents_skip_indexed_files() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}/ragFiles", CORPUS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ragFiles": [{ "displayName": "etomidate.md" }]
        })))
        .mount(&server)
        .await;

    let store = FsObjectStore::new(dir.path().join("objects"), "gs").unwrap();
    for key in ["etomidate", "ketamine"] {
        store
            .put_object(
                "test-corpus",
                &format!("processed/{}.md", key),
                b"# Doc".to_vec(),
                "text/markdown",
            )
            .await
            .unwrap();
    }

    let pending = pending_document_uris(&store, "test-corpus", &corpus_client(&server))
        .await
        .unwrap();
    assert_eq!(pending, vec!["gs://test-corpus/processed/ketamine.md".to_string()]);
}

#[tokio::test]
async fn test_unknown_operation_is_a_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/projects/test/operations/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let result = corpus_client(&server)
        .get_operation("projects/test/operations/missing")
        .await;
    assert!(matches!(result, Err(IndexError::Rejected { status: 404, .. })));
}

#[tokio::test]
async fn test_corpus_status_reads_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}", CORPUS)))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": CORPUS,
            "displayName": "litfl-corpus",
            "updateTime": "2024-03-04T10:00:00Z",
            "corpusStatus": { "state": "ACTIVE" }
        })))
        .mount(&server)
        .await;

    let status = corpus_client(&server).corpus_status().await.unwrap();
    assert_eq!(status.name, CORPUS);
    assert_eq!(status.display_name, "litfl-corpus");
    assert_eq!(status.state(), "ACTIVE");
}

#[tokio::test]
async fn test_validate_index_finds_missing_documents() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(format!("/v1/{}/ragFiles", CORPUS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ragFiles": [{ "displayName": "etomidate.md" }, { "displayName": "retired.md" }]
        })))
        .mount(&server)
        .await;

    let store = FsObjectStore::new(dir.path().join("objects"), "gs").unwrap();
    for key in ["etomidate", "ketamine"] {
        store
            .put_object(
                "test-corpus",
                &format!("processed/{}.md", key),
                b"# Doc".to_vec(),
                "text/markdown",
            )
            .await
            .unwrap();
    }

    let validation = validate_index(&store, "test-corpus", &corpus_client(&server))
        .await
        .unwrap();
    assert_eq!(validation.missing, vec!["ketamine".to_string()]);
    assert_eq!(validation.extra, vec!["retired".to_string()]);
    assert!(!validation.is_complete());
}
