//! DuckDuckGo metasearch source implementation.
//!
//! DuckDuckGo has no official search API. The HTML endpoint is scraped and
//! the query is restricted to PDFs with the `filetype:pdf` operator.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::models::{ResultKind, SearchQuery, SearchResult};
use crate::sources::{status_error, Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo web search restricted to PDF files
#[derive(Debug, Clone)]
pub struct DuckDuckGoSource {
    client: HttpClient,
    search_url: String,
}

impl DuckDuckGoSource {
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, DUCKDUCKGO_HTML_URL)
    }

    /// Create against a different search endpoint (for testing)
    pub fn with_base_url(client: HttpClient, search_url: &str) -> Self {
        Self {
            client,
            search_url: search_url.to_string(),
        }
    }

    fn build_query(query: &str) -> String {
        format!("{} filetype:pdf", query.trim())
    }

    /// Unwrap DuckDuckGo's `/l/?uddg=` redirect links
    ///
    /// Protocol-relative links get `https:`. Anything else is returned as is.
    fn resolve_link(href: &str) -> String {
        let href = href.trim();
        let absolute = if href.starts_with("//") {
            format!("https:{}", href)
        } else {
            href.to_string()
        };

        if let Ok(parsed) = url::Url::parse(&absolute) {
            if parsed.path().starts_with("/l/") {
                if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
                    return target.into_owned();
                }
            }
        }

        absolute
    }

    /// Parse one `div.result` block
    fn parse_result(elem: &ElementRef, source_name: &str) -> Option<SearchResult> {
        let title_selector = Selector::parse("a.result__a").ok()?;
        let title_elem = elem.select(&title_selector).next()?;

        let title = title_elem
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let href = title_elem.value().attr("href")?;

        let snippet_selector = Selector::parse(".result__snippet").ok()?;
        let snippet = elem
            .select(&snippet_selector)
            .next()
            .map(|s| s.text().collect::<String>())
            .unwrap_or_default();

        Some(
            SearchResult::new(
                title,
                Self::resolve_link(href),
                source_name,
                ResultKind::DirectArtifact,
            )
            .snippet(snippet),
        )
    }

    fn parse_results(html: &str, source_name: &str) -> Vec<SearchResult> {
        let document = Html::parse_document(html);
        let Ok(result_selector) = Selector::parse("div.result:not(.result--ad)") else {
            return Vec::new();
        };

        document
            .select(&result_selector)
            .filter_map(|elem| Self::parse_result(&elem, source_name))
            .collect()
    }
}

#[async_trait]
impl Source for DuckDuckGoSource {
    fn id(&self) -> &str {
        "duckduckgo"
    }

    fn name(&self) -> &str {
        "DuckDuckGo"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DIRECT_LINKS
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SourceError> {
        let q = Self::build_query(&query.query);

        let response = self
            .client
            .get(&self.search_url)
            .query(&[("q", q.as_str())])
            .header("Accept", "text/html")
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search DuckDuckGo: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("DuckDuckGo", response.status()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))?;

        let mut results = Self::parse_results(&html, self.name());
        tracing::debug!(count = results.len(), "Parsed DuckDuckGo results");
        results.truncate(query.max_results);
        Ok(results)
    }
}
