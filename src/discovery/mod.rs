//! URL discovery from sitemaps
//!
//! This module handles:
//! - Fetching a sitemap index and the nested sitemaps it lists
//! - Dropping non-content paths (admin, feeds, taxonomies, pagination, root)
//! - Classifying keys into content-type buckets
//! - Deduplicating by key and persisting the manifest plus a summary

mod manifest;
mod sitemap;

pub use manifest::{ClassificationSummary, Manifest, ManifestEntry};
pub use sitemap::{parse_lastmod, parse_sitemap, SitemapDocument, SitemapUrl};

use crate::config::{ClassifyRule, SourceConfig, StorageConfig};
use crate::extract::{fetch_text, FetchPolicy};
use crate::url::{key_from_url, matches_wildcard};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

/// Classification used when no rule matches
pub const DEFAULT_CLASSIFICATION: &str = "other";

/// Produces a manifest from a sitemap index URL
#[async_trait]
pub trait Discover: Send + Sync {
    async fn discover(&self, sitemap_index_url: &str) -> Result<Manifest>;
}

/// Maps keys to content-type tags using ordered wildcard rules
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: Vec<ClassifyRule>,
}

impl Classifier {
    pub fn new(rules: Vec<ClassifyRule>) -> Self {
        Self { rules }
    }

    /// Returns the tag of the first rule with a matching pattern
    pub fn classify(&self, key: &str) -> String {
        self.rules
            .iter()
            .find(|rule| rule.patterns.iter().any(|p| matches_wildcard(p, key)))
            .map(|rule| rule.tag.clone())
            .unwrap_or_else(|| DEFAULT_CLASSIFICATION.to_string())
    }
}

/// Decides which sitemap URLs are content pages
#[derive(Debug, Clone, Default)]
pub struct SkipFilter {
    patterns: Vec<String>,
}

impl SkipFilter {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    /// Returns the key of a content page, or `None` if the URL is skipped
    ///
    /// Skip patterns are substrings of the URL path; the bare root and
    /// unparseable URLs are always skipped.
    pub fn content_key(&self, url: &str) -> Option<String> {
        let parsed = url::Url::parse(url.trim()).ok()?;
        let path = parsed.path();
        if self.patterns.iter().any(|p| path.contains(p.as_str())) {
            return None;
        }
        key_from_url(url)
    }
}

/// Turns parsed sitemap entries into a deduplicated manifest
///
/// Entries are processed in sitemap order, so the first sitemap to list a key
/// decides its classification and origin.
pub fn build_manifest<'a>(
    sitemaps: impl IntoIterator<Item = (&'a str, &'a [SitemapUrl])>,
    skip: &SkipFilter,
    classifier: &Classifier,
) -> Manifest {
    let mut skipped = 0usize;
    let mut entries = Vec::new();

    for (origin, urls) in sitemaps {
        for url in urls {
            let Some(key) = skip.content_key(&url.loc) else {
                skipped += 1;
                continue;
            };
            entries.push(ManifestEntry {
                classification: classifier.classify(&key),
                key,
                url: url.loc.clone(),
                lastmod: url.lastmod,
                origin_sitemap: origin.to_string(),
            });
        }
    }

    let raw = entries.len();
    let manifest = Manifest::from_entries(entries);
    debug!(
        "Built manifest: {} unique of {} content URLs ({} skipped)",
        manifest.len(),
        raw,
        skipped
    );
    manifest
}

/// Sitemap-backed discoverer for one configured source
pub struct SitemapDiscoverer {
    client: Client,
    policy: FetchPolicy,
    include: Vec<String>,
    skip: SkipFilter,
    classifier: Classifier,
}

impl SitemapDiscoverer {
    pub fn new(client: Client, source: &SourceConfig, policy: FetchPolicy) -> Self {
        Self {
            client,
            policy,
            include: source.sitemap_include.clone(),
            skip: SkipFilter::new(source.skip_patterns.clone()),
            classifier: Classifier::new(source.classify.clone()),
        }
    }

    fn is_included(&self, sitemap_url: &str) -> bool {
        self.include.is_empty() || self.include.iter().any(|p| sitemap_url.contains(p.as_str()))
    }
}

#[async_trait]
impl Discover for SitemapDiscoverer {
    async fn discover(&self, sitemap_index_url: &str) -> Result<Manifest> {
        info!("Fetching sitemap index: {}", sitemap_index_url);
        let body = fetch_text(&self.client, sitemap_index_url, &self.policy)
            .await
            .map_err(|e| HarvestError::SitemapIndex {
                url: sitemap_index_url.to_string(),
                message: e.to_string(),
            })?;

        let mut parsed: Vec<(String, Vec<SitemapUrl>)> = Vec::new();
        match parse_sitemap(&body) {
            SitemapDocument::UrlSet(urls) => {
                parsed.push((sitemap_index_url.to_string(), urls));
            }
            SitemapDocument::Index(locations) => {
                let selected: Vec<String> = locations
                    .into_iter()
                    .filter(|loc| self.is_included(loc))
                    .collect();
                info!("Sitemap index lists {} selected sitemaps", selected.len());

                for location in selected {
                    match fetch_text(&self.client, &location, &self.policy).await {
                        Ok(xml) => match parse_sitemap(&xml) {
                            SitemapDocument::UrlSet(urls) => {
                                info!("  {}: {} URLs", location, urls.len());
                                parsed.push((location, urls));
                            }
                            SitemapDocument::Index(_) => {
                                warn!("Skipping nested sitemap index {}", location);
                            }
                        },
                        Err(e) => {
                            warn!("Skipping sitemap {}: {}", location, e);
                        }
                    }
                }
            }
        }

        let manifest = build_manifest(
            parsed
                .iter()
                .map(|(origin, urls)| (origin.as_str(), urls.as_slice())),
            &self.skip,
            &self.classifier,
        );
        info!("Discovered {} unique pages", manifest.len());
        Ok(manifest)
    }
}

/// Runs discovery and persists the manifest and classification summary
pub async fn discover_and_save(
    discoverer: &dyn Discover,
    sitemap_index_url: &str,
    storage: &StorageConfig,
) -> Result<(Manifest, ClassificationSummary)> {
    let manifest = discoverer.discover(sitemap_index_url).await?;
    let summary = ClassificationSummary::from_manifest(&manifest);

    manifest.save(&storage.manifest_path())?;
    summary.save(&storage.classification_summary_path())?;
    info!(
        "Saved manifest with {} entries to {}",
        manifest.len(),
        storage.manifest_path().display()
    );

    Ok((manifest, summary))
}
