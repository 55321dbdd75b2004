//! URL handling module for Corpus-Harvester
//!
//! This module provides key (slug) derivation, filesystem-safe names, image
//! URL canonicalization, and wildcard matching for classification rules.

mod matcher;
mod normalize;

// Re-export main functions
pub use matcher::matches_wildcard;
pub use normalize::{canonicalize_image_url, filename_from_url};

use url::Url;

/// Derives the manifest key from a page URL
///
/// The key is the URL path without surrounding slashes, so
/// `https://litfl.com/etomidate/` becomes `etomidate` and nested paths keep
/// their separators. The bare root yields `None`.
///
/// # Examples
///
/// ```
/// use corpus_harvester::url::key_from_url;
///
/// assert_eq!(key_from_url("https://litfl.com/etomidate/"), Some("etomidate".to_string()));
/// assert_eq!(key_from_url("https://litfl.com/"), None);
/// ```
pub fn key_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let key = parsed.path().trim_matches('/');

    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Converts a key into a name usable as a single file or object path segment
///
/// # Examples
///
/// ```
/// use corpus_harvester::url::safe_filename;
///
/// assert_eq!(safe_filename("ecg/lbbb example"), "ecg_lbbb_example");
/// ```
pub fn safe_filename(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ' ' | ':' | '?' | '*' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// Turns a key into a readable fallback title ("digoxin-toxicity" -> "Digoxin Toxicity")
pub fn title_from_key(key: &str) -> String {
    key.rsplit('/')
        .next()
        .unwrap_or(key)
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
