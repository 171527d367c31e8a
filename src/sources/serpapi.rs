//! SerpApi (Google results) source implementation.

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{ResultKind, SearchQuery, SearchResult, SERPAPI_API_KEY};
use crate::sources::{credential, status_error, Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}

/// Google web results through SerpApi, restricted to PDFs
#[derive(Debug, Clone)]
pub struct SerpApiSource {
    client: HttpClient,
    api_url: String,
}

impl SerpApiSource {
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, SERPAPI_URL)
    }

    /// Create against a different endpoint (for testing)
    pub fn with_base_url(client: HttpClient, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
        }
    }

    fn parse_response(body: &str, source_name: &str) -> Result<Vec<SearchResult>, SourceError> {
        let data: SerpApiResponse = serde_json::from_str(body)?;

        // "Google hasn't returned any results" is reported as an error with no results
        if let Some(error) = data.error {
            if data.organic_results.is_empty() && !error.to_lowercase().contains("hasn't returned any results") {
                return Err(SourceError::Api(error));
            }
        }

        Ok(data
            .organic_results
            .into_iter()
            .filter(|r| !r.link.trim().is_empty())
            .map(|r| {
                let title = if r.title.trim().is_empty() { r.link.clone() } else { r.title };
                SearchResult::new(title, r.link, source_name, ResultKind::DirectArtifact)
                    .snippet(r.snippet.unwrap_or_default())
            })
            .collect())
    }
}

#[async_trait]
impl Source for SerpApiSource {
    fn id(&self) -> &str {
        "serpapi"
    }

    fn name(&self) -> &str {
        "SerpApi"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DIRECT_LINKS | SourceCapabilities::PAID
    }

    fn required_credentials(&self) -> &[&'static str] {
        &[SERPAPI_API_KEY]
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SourceError> {
        let api_key = credential(query, SERPAPI_API_KEY)?;
        let q = format!("{} filetype:pdf", query.query.trim());
        let num = query.max_results.to_string();

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("engine", "google"),
                ("q", q.as_str()),
                ("num", num.as_str()),
                ("api_key", api_key),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to query SerpApi: {}", e)))?;

        if !response.status().is_success() {
            return Err(status_error("SerpApi", response.status()));
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
