//! arXiv search source implementation.

use async_trait::async_trait;
use feed_rs::parser;

use crate::models::{ResultKind, SearchQuery, SearchResult};
use crate::sources::{status_error, Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

/// Base URL for arXiv API
const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";
/// Base URL for arXiv PDFs
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";

/// arXiv preprint search
///
/// Every entry of the Atom response links to a PDF, so results are direct
/// artifacts.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: HttpClient,
    api_url: String,
}

impl ArxivSource {
    /// Create a new arXiv source
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, ARXIV_API_URL)
    }

    /// Create against a different API endpoint (for testing)
    pub fn with_base_url(client: HttpClient, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
        }
    }

    /// Build the `search_query` parameter
    fn build_search_query(query: &str) -> String {
        format!("all:{}", query.trim())
    }

    /// Parse an arXiv Atom feed into results
    fn parse_feed(body: &[u8], source_name: &str) -> Result<Vec<SearchResult>, SourceError> {
        let feed = parser::parse(body)
            .map_err(|e| SourceError::Parse(format!("Failed to parse Atom feed: {}", e)))?;

        Ok(feed
            .entries
            .iter()
            .filter_map(|entry| Self::parse_entry(entry, source_name))
            .collect())
    }

    /// Convert one feed entry; entries without a title or id are dropped
    fn parse_entry(entry: &feed_rs::model::Entry, source_name: &str) -> Option<SearchResult> {
        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&t.content))
            .filter(|t| !t.is_empty())?;

        let link = entry
            .links
            .iter()
            .find(|l| {
                l.media_type.as_deref() == Some("application/pdf")
                    || l.title.as_deref() == Some("pdf")
            })
            .map(|l| l.href.clone())
            .or_else(|| Self::pdf_url_from_id(&entry.id))?;

        let snippet = entry
            .summary
            .as_ref()
            .map(|s| collapse_whitespace(&s.content));

        let mut result = SearchResult::new(title, link, source_name, ResultKind::DirectArtifact);
        result.snippet = snippet.filter(|s| !s.is_empty());
        Some(result)
    }

    /// `http://arxiv.org/abs/2301.12345v1` -> `https://arxiv.org/pdf/2301.12345v1`
    fn pdf_url_from_id(id: &str) -> Option<String> {
        let paper_id = id.split("/abs/").nth(1)?.trim_matches('/');
        if paper_id.is_empty() {
            return None;
        }
        Some(format!("{}/{}", ARXIV_PDF_URL, paper_id))
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DIRECT_LINKS
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SourceError> {
        let search_query = Self::build_search_query(&query.query);
        // arXiv caps a page at 2000 entries
        let max_results = query.max_results.min(2000).to_string();

        tracing::debug!(query = %search_query, "Querying arXiv");

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
            ])
            .header("Accept", "application/atom+xml")
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to fetch arXiv results: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("arXiv", response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))?;

        let mut results = Self::parse_feed(bytes.as_ref(), self.name())?;
        results.truncate(query.max_results);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::HttpSettings;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>arXiv Query Results</title>
    <id>http://arxiv.org/api/query</id>
    <updated>2023-01-15T00:00:00Z</updated>
    <entry>
        <id>http://arxiv.org/abs/2301.12345v1</id>
        <title>Attention Is
            All You Need</title>
        <summary>  We propose a new
            architecture. </summary>
        <updated>2023-01-15T10:00:00Z</updated>
        <published>2023-01-15T10:00:00Z</published>
        <author><name>Test Author</name></author>
        <link rel="alternate" type="text/html" href="http://arxiv.org/abs/2301.12345v1"/>
        <link title="pdf" rel="related" type="application/pdf" href="http://arxiv.org/pdf/2301.12345v1"/>
    </entry>
    <entry>
        <id>http://arxiv.org/abs/2302.00001v2</id>
        <title>No PDF Link</title>
        <updated>2023-02-01T10:00:00Z</updated>
        <link rel="alternate" type="text/html" href="http://arxiv.org/abs/2302.00001v2"/>
    </entry>
</feed>"#;

    fn client() -> HttpClient {
        HttpClient::with_settings(&HttpSettings {
            requests_per_second: None,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_build_search_query() {
        assert_eq!(ArxivSource::build_search_query(" transformers "), "all:transformers");
    }

    #[test]
    fn test_parse_feed() {
        let results = ArxivSource::parse_feed(FEED.as_bytes(), "arXiv").unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].title, "Attention Is All You Need");
        assert_eq!(results[0].link, "http://arxiv.org/pdf/2301.12345v1");
        assert_eq!(results[0].snippet.as_deref(), Some("We propose a new architecture."));
        assert_eq!(results[0].kind, ResultKind::DirectArtifact);
        assert_eq!(results[0].source_name, "arXiv");

        // Falls back to the id when the entry has no PDF link
        assert_eq!(results[1].link, "https://arxiv.org/pdf/2302.00001v2");
    }

    #[test]
    fn test_parse_feed_rejects_garbage() {
        assert!(matches!(
            ArxivSource::parse_feed(b"<html>nope", "arXiv"),
            Err(SourceError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_search_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("search_query".into(), "all:attention".into()),
                mockito::Matcher::UrlEncoded("max_results".into(), "1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(FEED)
            .create_async()
            .await;

        let source = ArxivSource::with_base_url(client(), &format!("{}/api/query", server.url()));
        let results = source
            .search(&SearchQuery::new("attention").max_results(1))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_maps_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let source = ArxivSource::with_base_url(client(), &server.url());
        let err = source.search(&SearchQuery::new("x")).await.unwrap_err();
        assert!(matches!(err, SourceError::RateLimit));
    }
}
