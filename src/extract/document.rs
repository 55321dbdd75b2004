//! Normalized document produced by the extractor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 content digest
pub const CONTENT_HASH_LEN: usize = 16;

/// One heading-delimited block of article text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub level: u8,
    pub content: String,
    pub order: usize,
}

/// A content image found inside the article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedImage {
    /// Canonical URL (absolute, query and fragment removed)
    pub url: String,
    pub alt: String,
    pub caption: Option<String>,
    pub label: String,
    /// Heading of the section the image appeared under
    #[serde(rename = "associatedSectionHeading")]
    pub section_heading: String,
}

/// Everything extracted from one page
///
/// Created once per scrape attempt and never mutated afterwards; a re-scrape
/// produces a new document that replaces the stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDocument {
    pub key: String,
    pub url: String,
    pub title: String,
    pub author: String,
    pub license: String,
    /// `Source: [label](url) by author (license)`
    pub attribution: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub sections: Vec<Section>,
    pub images: Vec<ExtractedImage>,
    pub content_hash: String,
    pub scraped_at: DateTime<Utc>,
}

impl ExtractedDocument {
    /// Total characters of section text
    pub fn content_len(&self) -> usize {
        self.sections.iter().map(|s| s.content.len()).sum()
    }
}

/// Hashes section text only, so unchanged content always yields the same hash
///
/// # Example
///
/// ```
/// use corpus_harvester::extract::{content_hash, Section};
///
/// let sections = vec![Section {
///     heading: "Introduction".to_string(),
///     level: 2,
///     content: "Etomidate is an induction agent.".to_string(),
///     order: 0,
/// }];
/// assert_eq!(content_hash(&sections).len(), 16);
/// ```
pub fn content_hash(sections: &[Section]) -> String {
    let joined = sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(CONTENT_HASH_LEN);
    digest
}

/// Builds the attribution line carried on every document
pub fn attribution_line(label: &str, url: &str, author: &str, license: &str) -> String {
    format!("Source: [{}]({}) by {} ({})", label, url, author, license)
}
