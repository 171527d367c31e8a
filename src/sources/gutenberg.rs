//! Project Gutenberg book search.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::models::{ResultKind, SearchQuery, SearchResult};
use crate::sources::{status_error, Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

const GUTENBERG_BASE_URL: &str = "https://www.gutenberg.org";

/// Project Gutenberg catalogue search
///
/// Results point at a book's landing page, which lists the available formats.
/// They are not downloaded directly.
#[derive(Debug, Clone)]
pub struct GutenbergSource {
    client: HttpClient,
    base_url: String,
}

impl GutenbergSource {
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, GUTENBERG_BASE_URL)
    }

    /// Create against a different site root (for testing)
    pub fn with_base_url(client: HttpClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self) -> String {
        format!("{}/ebooks/search/", self.base_url)
    }

    fn parse_booklink(elem: &ElementRef, base: &url::Url, source_name: &str) -> Option<SearchResult> {
        let link_selector = Selector::parse("a.link").ok()?;
        let href = elem.select(&link_selector).next()?.value().attr("href")?;
        let link = base.join(href).ok()?;

        let title_selector = Selector::parse("span.title").ok()?;
        let title = elem
            .select(&title_selector)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())?;

        let author_selector = Selector::parse("span.subtitle").ok()?;
        let author = elem
            .select(&author_selector)
            .next()
            .map(|a| a.text().collect::<String>())
            .unwrap_or_default();

        Some(
            SearchResult::new(title, link.to_string(), source_name, ResultKind::LandingPage)
                .snippet(author),
        )
    }

    fn parse_results(html: &str, base_url: &str, source_name: &str) -> Result<Vec<SearchResult>, SourceError> {
        let base = url::Url::parse(base_url)
            .map_err(|e| SourceError::InvalidRequest(format!("Bad base URL {}: {}", base_url, e)))?;
        let document = Html::parse_document(html);
        let booklink_selector = Selector::parse("li.booklink")
            .map_err(|e| SourceError::Parse(format!("Invalid selector: {:?}", e)))?;

        Ok(document
            .select(&booklink_selector)
            .filter_map(|elem| Self::parse_booklink(&elem, &base, source_name))
            .collect())
    }
}

#[async_trait]
impl Source for GutenbergSource {
    fn id(&self) -> &str {
        "gutenberg"
    }

    fn name(&self) -> &str {
        "Project Gutenberg"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::LANDING_PAGES
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SourceError> {
        let response = self
            .client
            .get(&self.search_url())
            .query(&[("query", query.query.trim())])
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search Project Gutenberg: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("Project Gutenberg", response.status()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))?;

        let mut results = Self::parse_results(&html, &self.base_url, self.name())?;
        results.truncate(query.max_results);
        Ok(results)
    }
}
