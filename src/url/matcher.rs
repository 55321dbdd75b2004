/// Checks if a key matches a wildcard pattern
///
/// A `*` matches any run of characters (including none); every other
/// character must match literally. Patterns without a `*` are exact matches.
///
/// # Arguments
///
/// * `pattern` - The pattern, e.g. "*-ecg-*" or "*-ccc"
/// * `candidate` - The key to check against the pattern
///
/// # Examples
///
/// ```
/// use corpus_harvester::url::matches_wildcard;
///
/// assert!(matches_wildcard("*-ecg-*", "left-bundle-branch-block-ecg-library"));
/// assert!(matches_wildcard("*-ccc", "digoxin-toxicity-ccc"));
/// assert!(!matches_wildcard("*-ccc", "ccc-overview"));
/// assert!(matches_wildcard("etomidate", "etomidate"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return candidate == pattern;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];

    if !candidate.starts_with(first) {
        return false;
    }

    let mut rest = &candidate[first.len()..];
    for middle in &parts[1..parts.len() - 1] {
        if middle.is_empty() {
            continue;
        }
        match rest.find(middle) {
            Some(idx) => rest = &rest[idx + middle.len()..],
            None => return false,
        }
    }

    rest.len() >= last.len() && rest.ends_with(last)
}
