//! Content image extraction
//!
//! Lazy-loading WordPress themes scatter the real image URL across several
//! attributes. The best candidate is picked in this order:
//!
//! 1. `data-orig-file` (original upload)
//! 2. `data-lazy-src`
//! 3. the widest entry of `srcset` / `data-lazy-srcset`
//! 4. `src`
//!
//! `data:` placeholders are never selected.

use crate::extract::content::{figure_caption, inline_text};
use crate::extract::document::ExtractedImage;
use crate::url::{canonicalize_image_url, filename_from_url};
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use tracing::trace;
use url::Url;

/// Collects deduplicated content images while the section walk runs
pub struct ImageCollector {
    page_url: Url,
    filters: Vec<String>,
    min_width: u32,
    seen: HashSet<String>,
    images: Vec<ExtractedImage>,
}

impl ImageCollector {
    pub fn new(page_url: Url, filters: &[String], min_width: u32) -> Self {
        Self {
            page_url,
            filters: filters.iter().map(|f| f.to_lowercase()).collect(),
            min_width,
            seen: HashSet::new(),
            images: Vec::new(),
        }
    }

    /// Considers every `<img>` at or below `element`, tagging kept images
    /// with `section_heading`
    pub fn collect(&mut self, element: ElementRef<'_>, section_heading: &str) {
        let candidates: Vec<ElementRef<'_>> = if element.value().name() == "img" {
            vec![element]
        } else {
            element
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "img")
                .collect()
        };

        for img in candidates {
            if let Some(image) = self.consider(img, section_heading) {
                self.images.push(image);
            }
        }
    }

    fn consider(&mut self, img: ElementRef<'_>, section_heading: &str) -> Option<ExtractedImage> {
        let raw = best_image_url(img)?;
        let url = canonicalize_image_url(&raw, &self.page_url)?;

        let lowered = raw.to_lowercase();
        if self.filters.iter().any(|f| lowered.contains(f.as_str())) {
            trace!("Filtered image {}", raw);
            return None;
        }

        if let Some(width) = declared_width(img) {
            if width < self.min_width {
                trace!("Skipping {}px icon {}", width, raw);
                return None;
            }
        }

        if !self.seen.insert(url.to_string()) {
            return None;
        }

        let alt = attr(img, "alt").unwrap_or_default().to_string();
        Some(ExtractedImage {
            label: image_label(img, &url),
            caption: image_caption(img),
            alt,
            url: url.to_string(),
            section_heading: section_heading.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn into_images(self) -> Vec<ExtractedImage> {
        self.images
    }
}

/// Picks the best source URL of an `<img>`
pub fn best_image_url(img: ElementRef<'_>) -> Option<String> {
    attr(img, "data-orig-file")
        .or_else(|| attr(img, "data-lazy-src"))
        .map(str::to_string)
        .or_else(|| attr(img, "srcset").and_then(widest_srcset_entry))
        .or_else(|| attr(img, "data-lazy-srcset").and_then(widest_srcset_entry))
        .or_else(|| attr(img, "src").map(str::to_string))
}

/// Returns the URL of the widest candidate in a `srcset` value
///
/// Width (`300w`) and density (`2x`) descriptors are both compared
/// numerically; an entry without a descriptor counts as `1`.
pub fn widest_srcset_entry(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|candidate| {
            let mut parts = candidate.split_whitespace();
            let url = parts.next()?;
            if url.starts_with("data:") {
                return None;
            }
            let size = parts
                .next()
                .map(|d| d.trim_end_matches(['w', 'x']))
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(1.0);
            Some((url, size))
        })
        .fold(None, |best: Option<(&str, f64)>, (url, size)| match best {
            Some((_, best_size)) if best_size >= size => best,
            _ => Some((url, size)),
        })
        .map(|(url, _)| url.to_string())
}

fn attr<'a>(img: ElementRef<'a>, name: &str) -> Option<&'a str> {
    img.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.starts_with("data:"))
}

fn declared_width(img: ElementRef<'_>) -> Option<u32> {
    img.value()
        .attr("width")
        .map(|w| w.trim().trim_end_matches("px"))
        .and_then(|w| w.parse().ok())
}

/// Human-readable label: explicit title, then alt text, then the filename
fn image_label(img: ElementRef<'_>, url: &Url) -> String {
    if let Some(label) = attr(img, "data-image-title")
        .or_else(|| attr(img, "title"))
        .or_else(|| attr(img, "alt"))
    {
        return label.to_string();
    }

    filename_from_url(url)
        .map(|name| {
            let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(&name);
            stem.replace(['-', '_'], " ")
        })
        .unwrap_or_default()
}

/// Caption from the enclosing `<figure>`, else the WordPress caption attribute
fn image_caption(img: ElementRef<'_>) -> Option<String> {
    let from_figure = img
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "figure")
        .and_then(figure_caption);

    from_figure.or_else(|| {
        attr(img, "data-image-caption").and_then(|markup| {
            let fragment = Html::parse_fragment(markup);
            let text = inline_text(fragment.root_element());
            (!text.is_empty()).then_some(text)
        })
    })
}
