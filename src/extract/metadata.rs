//! Page-level metadata and soft-404 detection

use crate::config::ExtractConfig;
use crate::extract::content::inline_text;
use crate::url::title_from_key;
use scraper::{Html, Selector};

/// Author recorded when the page names none
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Separators sites append their name after in `<title>`
const TITLE_SEPARATORS: [&str; 3] = [" • ", " | ", " – "];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub date_modified: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

/// Reads title, author, description and modified date
///
/// Title falls back from the configured selectors to `og:title`, then the
/// first segment of `<title>`, then the key itself.
pub fn read_metadata(document: &Html, config: &ExtractConfig, key: &str) -> PageMetadata {
    let title = first_text(document, &config.title_selectors)
        .or_else(|| meta_content(document, "meta[property=\"og:title\"]"))
        .or_else(|| document_title(document).map(|t| site_suffix_removed(&t)))
        .unwrap_or_else(|| title_from_key(key));

    let author = first_text(document, &config.author_selectors)
        .or_else(|| meta_content(document, "meta[name=\"author\"]"))
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let description = meta_content(document, "meta[name=\"description\"]")
        .or_else(|| meta_content(document, "meta[property=\"og:description\"]"));

    let date_modified = meta_content(document, "meta[property=\"article:modified_time\"]")
        .or_else(|| {
            Selector::parse("time[datetime]").ok().and_then(|sel| {
                document
                    .select(&sel)
                    .next()
                    .and_then(|el| el.value().attr("datetime"))
                    .map(|v| v.trim().to_string())
            })
        });

    let (categories, tags) = post_terms(document);

    PageMetadata {
        title,
        author,
        description,
        date_modified,
        categories,
        tags,
    }
}

/// Categories and tags WordPress encodes in the `<article>` class list
///
/// `category-ecg-library` becomes "Ecg Library"; `tag-brugada-sign` becomes
/// "brugada sign".
fn post_terms(document: &Html) -> (Vec<String>, Vec<String>) {
    let mut categories = Vec::new();
    let mut tags = Vec::new();

    let Ok(selector) = Selector::parse("article") else {
        return (categories, tags);
    };
    if let Some(article) = document.select(&selector).next() {
        for class in article.value().classes() {
            if let Some(slug) = class.strip_prefix("category-") {
                categories.push(title_from_key(slug));
            } else if let Some(slug) = class.strip_prefix("tag-") {
                tags.push(slug.replace('-', " "));
            }
        }
    }
    (categories, tags)
}

/// Detects an error page served with HTTP 200
///
/// # Returns
///
/// The offending title if `<title>` or the first `<h1>` contains a marker
pub fn detect_soft_404(document: &Html, markers: &[String]) -> Option<String> {
    let h1 = Selector::parse("h1")
        .ok()
        .and_then(|sel| document.select(&sel).next().map(inline_text));

    document_title(document)
        .into_iter()
        .chain(h1)
        .find(|title| {
            let lowered = title.to_lowercase();
            markers.iter().any(|m| lowered.contains(&m.to_lowercase()))
        })
}

fn document_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(inline_text)
        .filter(|t| !t.is_empty())
}

fn site_suffix_removed(title: &str) -> String {
    TITLE_SEPARATORS
        .iter()
        .filter_map(|sep| title.split_once(sep).map(|(head, _)| head))
        .min_by_key(|head| head.len())
        .unwrap_or(title)
        .trim()
        .to_string()
}

fn first_text(document: &Html, selectors: &[String]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .map(inline_text)
            .find(|text| !text.is_empty())
    })
}

fn meta_content(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
