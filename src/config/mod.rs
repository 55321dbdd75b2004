//! Configuration module for Corpus-Harvester
//!
//! This module handles loading, parsing, and validating the TOML file that
//! plugs one content source into the engine.
//!
//! # Example
//!
//! ```no_run
//! use corpus_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("litfl.toml")).unwrap();
//! println!("Scraping {} with {} workers", config.source.name, config.scraper.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClassifyRule, Config, ExtractConfig, IndexerConfig, ScraperConfig, SourceConfig,
    StorageBackend, StorageConfig, UserAgentConfig, MAX_IMPORT_BATCH,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
