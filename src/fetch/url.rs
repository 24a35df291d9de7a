//! Deciding whether a source record is a URL to fetch or literal text.

use std::sync::OnceLock;

use regex::Regex;

/// Scheme prepended when a bare host/path fails the grammar on its own.
pub const DEFAULT_SCHEME: &str = "http://";

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^https?://(?:[a-z0-9-]+\.)*[a-z0-9_-]+\.[a-z]{2,7}(?:/[a-z0-9_:+-]+)*/?(?:\?[a-z0-9_-]+=[a-z0-9_-]+(?:&[a-z0-9_-]+=[a-z0-9_-]+)*)?$",
        )
        .expect("URL pattern must compile")
    })
}

fn strip_fragment(candidate: &str) -> &str {
    match candidate.rfind('#') {
        Some(idx) => &candidate[..idx],
        None => candidate,
    }
}

/// Returns true if `candidate` (fragment removed) matches the URL grammar.
pub fn is_url(candidate: &str) -> bool {
    url_pattern().is_match(strip_fragment(candidate.trim()))
}

/// Resolves a record into the URL that should be fetched, if any.
///
/// The record itself is tried first, then the record with [`DEFAULT_SCHEME`]
/// prepended. `None` means the record is literal source text.
pub fn resolve_source(record: &str) -> Option<String> {
    let record = record.trim();
    if is_url(record) {
        return Some(record.to_string());
    }
    let prefixed = format!("{}{}", DEFAULT_SCHEME, record);
    if is_url(&prefixed) {
        return Some(prefixed);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_urls() {
        assert!(is_url("https://example.com"));
        assert!(is_url("http://docs.example.co.uk/guide/getting-started"));
        assert!(is_url("https://example.com/search?q=shoes&page=2"));
        assert!(is_url("HTTPS://EXAMPLE.COM/About/"));
        assert!(is_url("https://example.com/page#section-2"));
    }

    #[test]
    fn test_rejects_non_urls() {
        assert!(!is_url("example.com"));
        assert!(!is_url("ftp://example.com"));
        assert!(!is_url("https://localhost"));
        assert!(!is_url("our return policy lasts 30 days"));
        assert!(!is_url("https://exa mple.com"));
    }

    #[test]
    fn test_path_segments_and_query_values_are_strict() {
        assert!(!is_url("https://example.com/page.html"));
        assert!(!is_url("https://example.com/search?q="));
        assert!(!is_url("https://example.com/search?q=v1.2"));
        assert!(is_url("https://example.com/docs/v1:beta+draft"));
        assert_eq!(resolve_source("https://example.com/page.html"), None);
    }

    #[test]
    fn test_resolve_prefixes_default_scheme() {
        assert_eq!(
            resolve_source("example.com/pricing"),
            Some("http://example.com/pricing".to_string())
        );
        assert_eq!(
            resolve_source("  https://example.com  "),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn test_malformed_url_is_literal_text() {
        assert_eq!(resolve_source("http://not a host/path"), None);
        assert_eq!(resolve_source("Shipping takes 3-5 business days."), None);
    }
}
