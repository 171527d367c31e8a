//! Search backend adapters with a uniform trait-based interface.
//!
//! This module defines the [`Source`] trait that every backend implements. The
//! aggregator treats all adapters identically: it hands each one a
//! [`SearchQuery`] and consumes the list of [`SearchResult`]s it returns,
//! whether the adapter calls a metasearch engine, an academic index, a paid
//! API or scrapes HTML.
//!
//! # Feature Flags
//!
//! Individual adapters can be disabled at compile time using Cargo features:
//!
//! - `duckduckgo` - DuckDuckGo HTML metasearch restricted to PDFs (default: enabled)
//! - `arxiv` - arXiv Atom API, links straight to PDFs (default: enabled)
//! - `gutenberg` - Project Gutenberg book search, landing pages (default: enabled)
//! - `serpapi` - SerpApi Google search, requires `SERPAPI_API_KEY` (default: enabled)
//! - `google_cse` - Google Custom Search, requires `GOOGLE_CSE_API_KEY` and
//!   `GOOGLE_CSE_CX` (default: enabled)
//!
//! # Feature Groups
//!
//! - `free` - duckduckgo, arxiv, gutenberg
//! - `paid` - serpapi, google_cse
//! - `full` - All adapters (default)
//!
//! Paid adapters are always compiled in by default but are skipped at search
//! time unless their credentials are supplied.

#[cfg(feature = "source-arxiv")]
mod arxiv;
#[cfg(feature = "source-duckduckgo")]
mod duckduckgo;
#[cfg(feature = "source-google-cse")]
mod google_cse;
#[cfg(feature = "source-gutenberg")]
mod gutenberg;
mod registry;
#[cfg(feature = "source-serpapi")]
mod serpapi;

pub mod mock;

#[cfg(feature = "source-arxiv")]
pub use arxiv::ArxivSource;
#[cfg(feature = "source-duckduckgo")]
pub use duckduckgo::DuckDuckGoSource;
#[cfg(feature = "source-google-cse")]
pub use google_cse::GoogleCseSource;
#[cfg(feature = "source-gutenberg")]
pub use gutenberg::GutenbergSource;
pub use mock::MockSource;
pub use registry::{SourceCapabilities, SourceRegistry};
#[cfg(feature = "source-serpapi")]
pub use serpapi::SerpApiSource;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{BackendSpec, ResultKind, SearchQuery, SearchResult};

/// The Source trait defines the interface for all search backends.
///
/// # Implementing a New Source
///
/// 1. Create a new struct that implements `Source`
/// 2. Implement `id`, `name` and `search`
/// 3. Declare credential names in `required_credentials` if the backend needs keys
/// 4. Add the source to `SourceRegistry::new()` or register it dynamically
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g., "duckduckgo", "arxiv")
    fn id(&self) -> &str;

    /// Human-readable name, used as `source_name` on results
    fn name(&self) -> &str;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DIRECT_LINKS
    }

    /// Credential names this source cannot run without
    fn required_credentials(&self) -> &[&'static str] {
        &[]
    }

    /// Kind assigned to every result this source produces
    fn result_kind(&self) -> ResultKind {
        if self
            .capabilities()
            .contains(SourceCapabilities::LANDING_PAGES)
        {
            ResultKind::LandingPage
        } else {
            ResultKind::DirectArtifact
        }
    }

    /// Default aggregator configuration for this source
    fn backend_spec(&self) -> BackendSpec {
        self.required_credentials()
            .iter()
            .fold(BackendSpec::new(self.id()), |spec, name| spec.require(*name))
    }

    /// Search for candidate links matching the query
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SourceError>;
}

/// Errors that can occur inside a source adapter
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (JSON, HTML, Atom, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit or quota exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// A required credential was not supplied
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

/// A backend failure as seen by the aggregator
///
/// Never fatal to a search: it is reported next to the results of the other
/// backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{source_name}: {message}")]
pub struct AdapterError {
    pub source_name: String,
    pub message: String,
}

impl AdapterError {
    pub fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn from_source_error(source_name: impl Into<String>, err: &SourceError) -> Self {
        Self::new(source_name, err.to_string())
    }
}

/// Fetch a credential from the query, failing with the credential's name
pub(crate) fn credential<'a>(query: &'a SearchQuery, name: &str) -> Result<&'a str, SourceError> {
    query
        .credentials
        .get(name)
        .ok_or_else(|| SourceError::MissingCredential(name.to_string()))
}

/// Map a non-success HTTP status to the matching adapter error
pub(crate) fn status_error(source: &str, status: reqwest::StatusCode) -> SourceError {
    match status.as_u16() {
        429 => SourceError::RateLimit,
        401 | 403 => SourceError::Api(format!("{} rejected the request: {}", source, status)),
        _ => SourceError::Api(format!("{} returned status: {}", source, status)),
    }
}
