//! Integration tests for Corpus-Harvester
//!
//! These tests use wiremock to stand in for the content source and the
//! remote corpus, and tempfile for output and object directories.

mod common;
mod discovery_tests;
mod indexer_tests;
mod pipeline_tests;
