//! Corpus-Harvester main entry point
//!
//! This is the command-line interface for the Corpus-Harvester engine.

use anyhow::{bail, Context};
use clap::Parser;
use corpus_harvester::config::{load_config_with_hash, Config, StorageBackend};
use corpus_harvester::crawler::{Orchestrator, RunOptions};
use corpus_harvester::discovery::{discover_and_save, Manifest, SitemapDiscoverer};
use corpus_harvester::extract::{build_http_client, FetchPolicy, HtmlExtractor};
use corpus_harvester::indexer::{
    pending_document_uris, validate_index, BatchImporter, HttpCorpusClient, ImportSettings,
    ImportSummary, Uploader,
};
use corpus_harvester::output::{
    load_statistics, print_classification_summary, print_import_summary, print_index_validation,
    print_run_summary, print_statistics,
};
use corpus_harvester::state::{ProgressTracker, RunMode};
use corpus_harvester::storage::{FsObjectStore, GcsObjectStore, ObjectStore};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Corpus-Harvester: a resumable sitemap-to-corpus harvester
///
/// Discovers article pages from a source's sitemaps, extracts structured
/// sections and images from each page under a fixed request pace, and
/// imports the results into a remote search corpus.
#[derive(Parser, Debug)]
#[command(name = "corpus-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A resumable sitemap-to-corpus harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discover pages from the sitemaps and write the manifest
    #[arg(long, conflicts_with_all = ["index", "stats", "dry_run", "validate"])]
    discover: bool,

    /// Import already-uploaded documents into the corpus without scraping
    #[arg(long, conflicts_with_all = ["discover", "stats", "dry_run", "validate"])]
    index: bool,

    /// Check that every uploaded document is in the corpus and exit
    #[arg(long, conflicts_with_all = ["discover", "index", "stats", "dry_run"])]
    validate: bool,

    /// Show statistics from the progress files and exit
    #[arg(long, conflicts_with_all = ["discover", "index", "dry_run", "validate"])]
    stats: bool,

    /// Validate config and show what would be scraped without scraping
    #[arg(long, conflicts_with_all = ["discover", "index", "stats", "validate"])]
    dry_run: bool,

    /// Number of concurrent workers (overrides the config)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Skip entries already completed in a previous run
    #[arg(long, conflicts_with = "force")]
    resume: bool,

    /// Re-scrape every entry, keeping previous progress
    #[arg(long, conflicts_with = "resume")]
    force: bool,

    /// Re-scrape only the entries that failed previously
    #[arg(long, conflicts_with_all = ["resume", "force"])]
    retry_errors: bool,

    /// Scrape at most N entries
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Keep documents local; skip object storage and indexing
    #[arg(long)]
    no_upload: bool,
}

impl Cli {
    fn mode(&self) -> RunMode {
        RunMode::from_flags(self.resume, self.force, self.retry_errors)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.stats {
        handle_stats(&config)
    } else if cli.discover {
        handle_discover(&config).await
    } else if cli.index {
        handle_index(&config).await
    } else if cli.validate {
        handle_validate(&config).await
    } else if cli.dry_run {
        handle_dry_run(&config, &cli)
    } else {
        handle_scrape(&config, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("corpus_harvester=info,warn"),
            1 => EnvFilter::new("corpus_harvester=debug,info"),
            2 => EnvFilter::new("corpus_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn http_client(config: &Config) -> anyhow::Result<Client> {
    build_http_client(&config.user_agent, config.scraper.request_timeout())
        .context("Failed to build HTTP client")
}

fn object_store(config: &Config, client: &Client) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Gcs => {
            let store = GcsObjectStore::from_config(client.clone(), storage)
                .context("Failed to set up the GCS object store")?;
            Ok(Arc::new(store))
        }
        StorageBackend::Filesystem => {
            let store = FsObjectStore::new(storage.object_root.clone(), storage.uri_scheme.clone())
                .with_context(|| {
                    format!(
                        "Failed to open object store at {}",
                        storage.object_root.display()
                    )
                })?;
            if config.indexer.enabled {
                tracing::warn!(
                    "Objects are stored locally under {}; the corpus can only import them once they are mirrored to {}://{}",
                    storage.object_root.display(),
                    storage.uri_scheme,
                    storage.bucket
                );
            }
            Ok(Arc::new(store))
        }
    }
}

fn corpus_client(config: &Config, client: Client) -> anyhow::Result<Arc<HttpCorpusClient>> {
    let corpus = HttpCorpusClient::from_config(client, &config.indexer)
        .context("Failed to set up the corpus client")?;
    Ok(Arc::new(corpus))
}

fn load_manifest(config: &Config) -> anyhow::Result<Manifest> {
    let path = config.storage.manifest_path();
    Manifest::load(&path).with_context(|| {
        format!(
            "No usable manifest at {} (run with --discover first)",
            path.display()
        )
    })
}

/// Handles the --stats mode: shows statistics from the progress files
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Progress: {}\n", config.storage.progress_path().display());

    let report = load_statistics(&config.storage).context("Failed to read progress files")?;
    print_statistics(&report);

    Ok(())
}

/// Handles the --discover mode: builds and saves the manifest
async fn handle_discover(config: &Config) -> anyhow::Result<()> {
    tracing::info!(
        "Discovering {} from {}",
        config.source.display_label(),
        config.source.sitemap_index_url
    );

    let discoverer = SitemapDiscoverer::new(
        http_client(config)?,
        &config.source,
        FetchPolicy::from_config(&config.scraper),
    );
    let (_manifest, summary) = discover_and_save(
        &discoverer,
        &config.source.sitemap_index_url,
        &config.storage,
    )
    .await
    .context("Discovery failed")?;

    print_classification_summary(&summary);
    println!(
        "✓ Manifest written to: {}",
        config.storage.manifest_path().display()
    );

    Ok(())
}

/// Handles the --index mode: imports uploaded documents not yet in the corpus
async fn handle_index(config: &Config) -> anyhow::Result<()> {
    if !config.indexer.enabled {
        bail!("The indexer is disabled in the configuration");
    }

    let client = http_client(config)?;
    let store = object_store(config, &client)?;
    let corpus = corpus_client(config, client)?;

    let uris = pending_document_uris(store.as_ref(), &config.storage.bucket, corpus.as_ref())
        .await
        .context("Failed to list documents to import")?;
    if uris.is_empty() {
        println!("Nothing to import; the corpus is up to date.");
        return Ok(());
    }

    let importer = BatchImporter::new(corpus, ImportSettings::from_config(&config.indexer));
    let summary = importer.import_all(&uris).await;
    report_imports(&summary);

    Ok(())
}

/// Handles the --validate mode: compares the corpus with the uploaded documents
async fn handle_validate(config: &Config) -> anyhow::Result<()> {
    if !config.indexer.enabled {
        bail!("The indexer is disabled in the configuration");
    }

    let client = http_client(config)?;
    let store = object_store(config, &client)?;
    let corpus = corpus_client(config, client)?;

    let status = corpus
        .corpus_status()
        .await
        .context("Failed to read the corpus status")?;
    let validation = validate_index(store.as_ref(), &config.storage.bucket, corpus.as_ref())
        .await
        .context("Failed to compare the corpus with the uploaded documents")?;
    print_index_validation(&status, &validation);

    if !validation.is_complete() {
        bail!(
            "{} uploaded documents are missing from the corpus (run with --index)",
            validation.missing.len()
        );
    }
    println!("✓ Every uploaded document is indexed");

    Ok(())
}

fn report_imports(summary: &ImportSummary) {
    print_import_summary(summary);
    if !summary.all_succeeded() {
        tracing::warn!("Some import batches did not succeed; rerun with --index to retry them");
    }
}

/// Handles the --dry-run mode: validates config and shows what would be scraped
fn handle_dry_run(config: &Config, cli: &Cli) -> anyhow::Result<()> {
    println!("=== Corpus-Harvester Dry Run ===\n");

    println!("Source:");
    println!("  Name: {}", config.source.name);
    println!("  Label: {}", config.source.display_label());
    println!("  Sitemap index: {}", config.source.sitemap_index_url);
    println!("  License: {}", config.source.license);
    println!("  Classification rules: {}", config.source.classify.len());

    println!("\nScraper:");
    println!(
        "  Workers: {}",
        cli.workers.unwrap_or(config.scraper.workers)
    );
    println!("  Request delay: {}ms", config.scraper.request_delay_ms);
    println!("  Checkpoint every: {} entries", config.scraper.checkpoint_interval);

    println!("\nStorage:");
    println!("  Output dir: {}", config.storage.output_dir.display());
    match config.storage.backend {
        StorageBackend::Gcs => println!(
            "  Objects: gs://{} (via {})",
            config.storage.bucket, config.storage.gcs_endpoint
        ),
        StorageBackend::Filesystem => println!(
            "  Objects: {}://{} (at {})",
            config.storage.uri_scheme,
            config.storage.bucket,
            config.storage.object_root.display()
        ),
    }

    println!("\nIndexer:");
    if config.indexer.enabled {
        println!("  Corpus: {}", config.indexer.corpus);
        println!("  Batch size: {}", config.indexer.batch_size);
    } else {
        println!("  Disabled");
    }

    let manifest = load_manifest(config)?;
    let tracker = Arc::new(ProgressTracker::from_config(&config.storage));
    let mode = cli.mode();
    if mode.loads_progress() {
        tracker.load().context("Failed to load progress")?;
    }

    let orchestrator = Orchestrator::new(
        Arc::new(HtmlExtractor::new(
            http_client(config)?,
            &config.source,
            FetchPolicy::from_config(&config.scraper),
        )),
        tracker,
        &config.scraper,
        config.storage.processed_dir(),
    );
    let options = RunOptions::new(mode, config.scraper.workers).with_limit(cli.limit);
    let plan = orchestrator.plan(&manifest, &options);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would scrape {} of {} manifest entries in {} mode ({} skipped)",
        plan.entries.len(),
        manifest.len(),
        mode,
        plan.skipped
    );

    Ok(())
}

/// Handles the main scrape operation, followed by indexing of the uploads
async fn handle_scrape(config: &Config, cli: &Cli) -> anyhow::Result<()> {
    let workers = cli.workers.unwrap_or(config.scraper.workers);
    if workers == 0 {
        bail!("--workers must be at least 1");
    }

    let manifest = load_manifest(config)?;
    let client = http_client(config)?;
    let mode = cli.mode();

    // Fatal setup problems surface before any entry is dispatched
    let processed_dir = config.storage.processed_dir();
    std::fs::create_dir_all(&processed_dir)
        .with_context(|| format!("Cannot create output directory {}", processed_dir.display()))?;
    let upload = !cli.no_upload;
    let corpus = if upload && config.indexer.enabled {
        Some(corpus_client(config, client.clone())?)
    } else {
        None
    };
    tracing::info!(
        "Scraping {} ({} manifest entries, mode {})",
        config.source.display_label(),
        manifest.len(),
        mode
    );

    let extractor = Arc::new(HtmlExtractor::new(
        client.clone(),
        &config.source,
        FetchPolicy::from_config(&config.scraper),
    ));
    let tracker = Arc::new(ProgressTracker::from_config(&config.storage));
    let mut orchestrator = Orchestrator::new(extractor, tracker, &config.scraper, processed_dir);

    if upload {
        let uploader = Uploader::new(
            object_store(config, &client)?,
            config.storage.bucket.clone(),
            client.clone(),
        );
        orchestrator = orchestrator.with_uploader(Arc::new(uploader));
    } else {
        tracing::info!("Uploads disabled; documents stay in the output directory");
    }

    let options = RunOptions::new(mode, workers).with_limit(cli.limit);
    let summary = orchestrator
        .run_until(&manifest, options, shutdown_signal())
        .await
        .context("Scrape run failed")?;
    print_run_summary(&summary);

    if summary.errored > 0 {
        tracing::warn!(
            "{} entries failed; see {} (rerun with --retry-errors)",
            summary.errored,
            config.storage.errors_path().display()
        );
    }

    if summary.interrupted {
        return Ok(());
    }

    if let Some(corpus) = corpus {
        if summary.uploaded_uris.is_empty() {
            tracing::info!("No documents uploaded; nothing to import");
        } else {
            let importer = BatchImporter::new(corpus, ImportSettings::from_config(&config.indexer));
            let imports = importer.import_all(&summary.uploaded_uris).await;
            report_imports(&imports);
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Interrupt received");
}
