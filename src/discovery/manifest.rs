//! Manifest and classification summary persistence

use crate::storage::write_atomic;
use crate::{HarvestError, Result};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// One discovered content page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Unique key within the source (the URL slug)
    pub key: String,
    #[serde(alias = "sourceUrl")]
    pub url: String,
    #[serde(default, alias = "lastModified")]
    pub lastmod: Option<DateTime<Utc>>,
    #[serde(default)]
    pub origin_sitemap: String,
    pub classification: String,
}

/// Discovered, deduplicated, classified list of pages to scrape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub discovered_at: DateTime<Utc>,
    pub total_unique: usize,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Builds a manifest, keeping the first entry seen for each key
    pub fn from_entries(entries: impl IntoIterator<Item = ManifestEntry>) -> Self {
        let mut seen = HashSet::new();
        let entries: Vec<ManifestEntry> = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.key.clone()))
            .collect();

        Self {
            discovered_at: Utc::now(),
            total_unique: entries.len(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// Writes the manifest atomically as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &bytes)?;
        Ok(())
    }

    /// Loads a manifest written by [`Manifest::save`]
    ///
    /// A missing or unreadable manifest is fatal for a scrape run.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            HarvestError::Manifest(format!("cannot read {}: {}", path.display(), e))
        })?;
        let manifest: Manifest = serde_json::from_slice(&bytes).map_err(|e| {
            HarvestError::Manifest(format!("cannot parse {}: {}", path.display(), e))
        })?;

        let unique: HashSet<&str> = manifest.entries.iter().map(|e| e.key.as_str()).collect();
        if unique.len() != manifest.entries.len() {
            return Err(HarvestError::Manifest(format!(
                "{} contains duplicate keys",
                path.display()
            )));
        }

        Ok(manifest)
    }
}

/// Counts of discovered pages by classification, origin sitemap, and year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSummary {
    pub total: usize,
    pub by_classification: BTreeMap<String, usize>,
    pub by_origin: BTreeMap<String, usize>,
    pub by_year: BTreeMap<String, usize>,
}

impl ClassificationSummary {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut summary = Self {
            total: manifest.len(),
            ..Self::default()
        };

        for entry in &manifest.entries {
            *summary
                .by_classification
                .entry(entry.classification.clone())
                .or_insert(0) += 1;
            *summary
                .by_origin
                .entry(entry.origin_sitemap.clone())
                .or_insert(0) += 1;
            let year = entry
                .lastmod
                .map(|ts| ts.year().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            *summary.by_year.entry(year).or_insert(0) += 1;
        }

        summary
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &bytes)?;
        Ok(())
    }
}
