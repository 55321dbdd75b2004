use url::Url;

/// Resolves and canonicalizes an image URL for deduplication and re-hosting
///
/// # Normalization Steps
///
/// 1. Resolve relative references against the page URL
/// 2. Reject anything that is not HTTP(S) (data URIs, javascript:)
/// 3. Lowercase the host
/// 4. Remove dot segments from the path
/// 5. Drop the query string and fragment (CDN resize parameters, anchors)
///
/// # Arguments
///
/// * `raw` - The attribute value as found in the markup
/// * `page_url` - The URL of the page the image was found on
///
/// # Returns
///
/// * `Some(Url)` - The canonical URL
/// * `None` - The reference is empty, malformed or not HTTP(S)
///
/// # Examples
///
/// ```
/// use corpus_harvester::url::canonicalize_image_url;
/// use url::Url;
///
/// let page = Url::parse("https://litfl.com/etomidate/").unwrap();
/// let url = canonicalize_image_url("/wp-content/uploads/ECG.jpg?resize=300", &page).unwrap();
/// assert_eq!(url.as_str(), "https://litfl.com/wp-content/uploads/ECG.jpg");
/// ```
pub fn canonicalize_image_url(raw: &str, page_url: &Url) -> Option<Url> {
    let raw = raw.trim();

    if raw.is_empty() || raw.starts_with("data:") || raw.starts_with("javascript:") {
        return None;
    }

    let mut url = page_url.join(raw).ok()?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = url.host_str()?.to_lowercase();
    url.set_host(Some(&host)).ok()?;

    let path = normalize_path(url.path());
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    Some(url)
}

/// Returns the last path segment of a URL, if any
pub fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.to_string())
}

/// Normalizes a URL path by removing dot segments and repeated slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    format!("/{}", normalized_segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://litfl.com/etomidate/").unwrap()
    }

    #[test]
    fn test_absolute_url_kept() {
        let url = canonicalize_image_url("https://litfl.com/img/a.png", &page()).unwrap();
        assert_eq!(url.as_str(), "https://litfl.com/img/a.png");
    }

    #[test]
    fn test_relative_url_resolved() {
        let url = canonicalize_image_url("img/a.png", &page()).unwrap();
        assert_eq!(url.as_str(), "https://litfl.com/etomidate/img/a.png");
    }

    #[test]
    fn test_protocol_relative_url() {
        let url = canonicalize_image_url("//i0.wp.com/litfl.com/a.png?w=640", &page()).unwrap();
        assert_eq!(url.as_str(), "https://i0.wp.com/litfl.com/a.png");
    }

    #[test]
    fn test_query_and_fragment_dropped() {
        let a = canonicalize_image_url("https://litfl.com/a.png?resize=300%2C200", &page());
        let b = canonicalize_image_url("https://litfl.com/a.png#zoom", &page());
        assert_eq!(a, b);
    }

    #[test]
    fn test_host_lowercased() {
        let url = canonicalize_image_url("https://LITFL.com/a.png", &page()).unwrap();
        assert_eq!(url.host_str(), Some("litfl.com"));
    }

    #[test]
    fn test_dot_segments_removed() {
        let url = canonicalize_image_url("https://litfl.com/a/../b/./c.png", &page()).unwrap();
        assert_eq!(url.path(), "/b/c.png");
    }

    #[test]
    fn test_data_uri_rejected() {
        assert!(canonicalize_image_url("data:image/svg+xml;base64,AAAA", &page()).is_none());
        assert!(canonicalize_image_url("", &page()).is_none());
        assert!(canonicalize_image_url("   ", &page()).is_none());
    }

    #[test]
    fn test_filename_from_url() {
        let url = Url::parse("https://litfl.com/wp-content/uploads/ECG-LBBB.jpg").unwrap();
        assert_eq!(filename_from_url(&url), Some("ECG-LBBB.jpg".to_string()));

        let root = Url::parse("https://litfl.com/").unwrap();
        assert_eq!(filename_from_url(&root), None);
    }
}
