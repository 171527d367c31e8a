//! Google Programmable Search (Custom Search JSON API) source implementation.

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{ResultKind, SearchQuery, SearchResult, GOOGLE_CSE_API_KEY, GOOGLE_CSE_CX};
use crate::sources::{credential, status_error, Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

const GOOGLE_CSE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// The API returns at most ten items per request
const MAX_PAGE_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
    #[serde(default)]
    error: Option<CseError>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CseError {
    #[serde(default)]
    message: String,
}

/// Google Custom Search restricted to `fileType=pdf`
#[derive(Debug, Clone)]
pub struct GoogleCseSource {
    client: HttpClient,
    api_url: String,
}

impl GoogleCseSource {
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, GOOGLE_CSE_URL)
    }

    /// Create against a different endpoint (for testing)
    pub fn with_base_url(client: HttpClient, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
        }
    }

    fn parse_response(body: &str, source_name: &str) -> Result<Vec<SearchResult>, SourceError> {
        let data: CseResponse = serde_json::from_str(body)?;

        if let Some(error) = data.error {
            return Err(SourceError::Api(error.message));
        }

        Ok(data
            .items
            .into_iter()
            .filter(|item| !item.link.trim().is_empty())
            .map(|item| {
                SearchResult::new(item.title, item.link, source_name, ResultKind::DirectArtifact)
                    .snippet(item.snippet.unwrap_or_default())
            })
            .collect())
    }
}

#[async_trait]
impl Source for GoogleCseSource {
    fn id(&self) -> &str {
        "google_cse"
    }

    fn name(&self) -> &str {
        "Google CSE"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DIRECT_LINKS | SourceCapabilities::PAID
    }

    fn required_credentials(&self) -> &[&'static str] {
        &[GOOGLE_CSE_API_KEY, GOOGLE_CSE_CX]
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SourceError> {
        let key = credential(query, GOOGLE_CSE_API_KEY)?;
        let cx = credential(query, GOOGLE_CSE_CX)?;
        let num = query.max_results.clamp(1, MAX_PAGE_SIZE).to_string();

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("key", key),
                ("cx", cx),
                ("q", query.query.trim()),
                ("fileType", "pdf"),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to query Google CSE: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("Google CSE", response.status()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))?;

        let mut results = Self::parse_response(&body, self.name())?;
        results.truncate(query.max_results);
        Ok(results)
    }
}
