//! Deduplication of search results across backends.

use std::collections::HashSet;

use crate::models::SearchResult;

/// Normalize a link for duplicate detection
///
/// Keeps scheme, host, port and path; drops the query string, the fragment and
/// any trailing slash. Scheme and host are lowercased, the path is not. Links
/// that do not parse as URLs are compared by their trimmed text with the same
/// query/fragment/slash rules applied.
pub fn normalize_link(link: &str) -> String {
    let link = link.trim();

    match url::Url::parse(link) {
        Ok(parsed) => {
            let mut key = format!("{}://", parsed.scheme());
            if let Some(host) = parsed.host_str() {
                key.push_str(&host.to_lowercase());
            }
            if let Some(port) = parsed.port() {
                key.push_str(&format!(":{}", port));
            }
            key.push_str(parsed.path().trim_end_matches('/'));
            key
        }
        Err(_) => {
            let end = link.find(['?', '#']).unwrap_or(link.len());
            link[..end].trim_end_matches('/').to_string()
        }
    }
}

/// Remove results whose normalized link was already seen
///
/// The first occurrence wins and keeps its `source_name`; relative order of
/// the survivors is unchanged.
pub fn deduplicate_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen: HashSet<String> = HashSet::with_capacity(results.len());

    results
        .into_iter()
        .filter(|result| seen.insert(normalize_link(&result.link)))
        .collect()
}
