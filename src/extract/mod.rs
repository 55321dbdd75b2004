//! Page extraction
//!
//! This module turns one fetched page into an [`ExtractedDocument`]:
//! - Soft-404 detection
//! - Metadata (title, author, description, modified date)
//! - Noise stripping and content container location
//! - The section walk with content-end truncation
//! - Image extraction and deduplication
//! - Content hashing over the final section text

mod content;
mod document;
mod end_marker;
mod fetcher;
mod images;
mod metadata;

pub use content::{locate_container, render_block, strip_noise, SectionWalker, DEFAULT_HEADING};
pub use document::{
    attribution_line, content_hash, ExtractedDocument, ExtractedImage, Section, CONTENT_HASH_LEN,
};
pub use end_marker::ContentEndDetector;
pub use fetcher::{build_http_client, fetch_text, FetchPolicy};
pub use images::{best_image_url, widest_srcset_entry, ImageCollector};
pub use metadata::{detect_soft_404, read_metadata, PageMetadata, UNKNOWN_AUTHOR};

use crate::config::{ExtractConfig, SourceConfig};
use crate::ExtractionError;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use scraper::Html;
use tracing::debug;
use url::Url;

/// Produces a document for one manifest entry
#[async_trait]
pub trait Extract: Send + Sync {
    async fn extract(&self, key: &str, url: &str) -> Result<ExtractedDocument, ExtractionError>;
}

/// Extractor driven by a source's markup heuristics
pub struct HtmlExtractor {
    client: Client,
    policy: FetchPolicy,
    rules: ExtractConfig,
    detector: ContentEndDetector,
    label: String,
    license: String,
}

impl HtmlExtractor {
    pub fn new(client: Client, source: &SourceConfig, policy: FetchPolicy) -> Self {
        Self {
            client,
            policy,
            detector: ContentEndDetector::new(source.extract.content_end_markers.clone()),
            rules: source.extract.clone(),
            label: source.display_label().to_string(),
            license: source.license.clone(),
        }
    }

    /// Extracts a document from already-fetched HTML
    ///
    /// Pure with respect to its input apart from `scraped_at`: the same bytes
    /// always yield the same sections, images and content hash.
    pub fn extract_html(
        &self,
        key: &str,
        url: &str,
        html: &str,
    ) -> Result<ExtractedDocument, ExtractionError> {
        let page_url = Url::parse(url).map_err(|e| ExtractionError::Parse {
            url: url.to_string(),
            message: format!("invalid page URL: {}", e),
        })?;

        let mut document = Html::parse_document(html);

        if let Some(title) = detect_soft_404(&document, &self.rules.soft_404_markers) {
            return Err(ExtractionError::SoftNotFound {
                url: url.to_string(),
                title,
            });
        }

        let meta = read_metadata(&document, &self.rules, key);
        let stripped = strip_noise(&mut document, &self.rules);

        let container =
            locate_container(&document, &self.rules).ok_or_else(|| ExtractionError::Parse {
                url: url.to_string(),
                message: "no content container".to_string(),
            })?;

        let mut images = ImageCollector::new(
            page_url,
            &self.rules.image_filter_patterns,
            self.rules.min_image_width,
        );
        let sections = SectionWalker::new(&self.detector, &mut images).run(container);

        if sections.is_empty() {
            return Err(ExtractionError::EmptyContent {
                url: url.to_string(),
            });
        }

        let doc = ExtractedDocument {
            key: key.to_string(),
            url: url.to_string(),
            attribution: attribution_line(&self.label, url, &meta.author, &self.license),
            title: meta.title,
            author: meta.author,
            license: self.license.clone(),
            description: meta.description,
            date_modified: meta.date_modified,
            categories: meta.categories,
            tags: meta.tags,
            content_hash: content_hash(&sections),
            sections,
            images: images.into_images(),
            scraped_at: Utc::now(),
        };

        debug!(
            "Extracted {}: {} sections ({} chars), {} images, {} noise regions stripped",
            key,
            doc.sections.len(),
            doc.content_len(),
            doc.images.len(),
            stripped
        );
        Ok(doc)
    }
}

#[async_trait]
impl Extract for HtmlExtractor {
    async fn extract(&self, key: &str, url: &str) -> Result<ExtractedDocument, ExtractionError> {
        let html = fetch_text(&self.client, url, &self.policy).await?;
        self.extract_html(key, url, &html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::time::Duration;

    const PAGE: &str = r#"<html><head><title>Etomidate • LITFL</title></head><body>
<nav>Home | About</nav>
<article><h1 class="entry-title">Etomidate</h1>
<div class="entry-content">
  <p>Etomidate is an imidazole derivative used for rapid sequence induction.</p>
  <figure><img data-orig-file="/wp-content/uploads/etomidate.png" src="data:image/gif;base64,AA"><figcaption>Structure</figcaption></figure>
  <h2>Pharmacodynamics</h2>
  <ul><li>GABA-A agonist</li><li>Minimal haemodynamic effect</li></ul>
  <div class="sharedaddy"><h3>Share this:</h3><p>Twitter</p></div>
  <p>References follow.</p>
  <p>Click to share on Facebook</p>
  <p>Should never appear</p>
</div></article></body></html>"#;

    fn extractor(markers: &[&str]) -> HtmlExtractor {
        let mut source: SourceConfig = toml::from_str(
            r#"
name = "litfl"
label = "LITFL"
base-url = "https://litfl.com"
sitemap-index-url = "https://litfl.com/sitemap_index.xml"
license = "CC BY-NC-SA 4.0"
"#,
        )
        .unwrap();
        source.extract.content_end_markers = markers.iter().map(|m| m.to_string()).collect();

        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HtmlExtractor::new(client, &source, FetchPolicy::no_retry())
    }

    #[test]
    fn test_extract_full_page() {
        let doc = extractor(&["Click to share"])
            .extract_html("etomidate", "https://litfl.com/etomidate/", PAGE)
            .unwrap();

        assert_eq!(doc.title, "Etomidate");
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].heading, DEFAULT_HEADING);
        assert!(doc.sections[0].content.contains("[Image: Structure]"));
        assert_eq!(doc.sections[1].heading, "Pharmacodynamics");
        assert!(doc.sections[1].content.starts_with("- GABA-A agonist"));
        assert!(doc.sections[1].content.ends_with("References follow."));
        assert!(!doc.sections.iter().any(|s| s.content.contains("Twitter")));
        assert!(!doc.sections.iter().any(|s| s.content.contains("never")));

        assert_eq!(doc.images.len(), 1);
        assert_eq!(
            doc.images[0].url,
            "https://litfl.com/wp-content/uploads/etomidate.png"
        );
        assert_eq!(doc.images[0].section_heading, DEFAULT_HEADING);
        assert_eq!(doc.content_hash.len(), CONTENT_HASH_LEN);
        assert!(doc.attribution.starts_with("Source: [LITFL](https://litfl.com/etomidate/)"));
    }

    #[test]
    fn test_hash_is_stable_across_extractions() {
        let ex = extractor(&["Click to share"]);
        let first = ex
            .extract_html("etomidate", "https://litfl.com/etomidate/", PAGE)
            .unwrap();
        let second = ex
            .extract_html("etomidate", "https://litfl.com/etomidate/", PAGE)
            .unwrap();

        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(first.sections, second.sections);
    }

    #[test]
    fn test_hash_reflects_truncation() {
        let with_marker = extractor(&["Click to share"])
            .extract_html("etomidate", "https://litfl.com/etomidate/", PAGE)
            .unwrap();
        let without = extractor(&[])
            .extract_html("etomidate", "https://litfl.com/etomidate/", PAGE)
            .unwrap();
        assert_ne!(with_marker.content_hash, without.content_hash);
    }

    #[test]
    fn test_all_noise_page_is_empty_content() {
        let html = r#"<html><body><article><div class="entry-content">
            <div class="sharedaddy">Share</div><script>track()</script>
        </div></article></body></html>"#;
        let err = extractor(&[])
            .extract_html("x", "https://litfl.com/x/", html)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyContent);
    }

    #[test]
    fn test_soft_404_page() {
        let html = r#"<html><head><title>Page not found - LITFL</title></head>
            <body><h1 class="page-title">Oops! That page can't be found.</h1></body></html>"#;
        let err = extractor(&[])
            .extract_html("gone", "https://litfl.com/gone/", html)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::SoftNotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
