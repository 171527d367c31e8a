//! Registry for managing search backend adapters.

use std::sync::Arc;

#[cfg(feature = "source-arxiv")]
use super::ArxivSource;
#[cfg(feature = "source-duckduckgo")]
use super::DuckDuckGoSource;
#[cfg(feature = "source-google-cse")]
use super::GoogleCseSource;
#[cfg(feature = "source-gutenberg")]
use super::GutenbergSource;
#[cfg(feature = "source-serpapi")]
use super::SerpApiSource;
use super::{Source, SourceError};
use crate::models::BackendSpec;
use crate::utils::HttpClient;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        /// Results link straight to files
        const DIRECT_LINKS = 1 << 1;
        /// Results link to pages that need further navigation
        const LANDING_PAGES = 1 << 2;
        /// Backed by a metered API that needs a key
        const PAID = 1 << 3;
    }
}

/// Registry for all available search backends
///
/// Sources keep their registration order, which is also the default backend
/// order for aggregated searches.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create a registry with every compiled-in source sharing one HTTP client
    #[allow(unused_variables)]
    pub fn new(client: &HttpClient) -> Self {
        let mut registry = Self::empty();

        #[cfg(feature = "source-duckduckgo")]
        registry.register(Arc::new(DuckDuckGoSource::new(client.clone())));
        #[cfg(feature = "source-arxiv")]
        registry.register(Arc::new(ArxivSource::new(client.clone())));
        #[cfg(feature = "source-gutenberg")]
        registry.register(Arc::new(GutenbergSource::new(client.clone())));
        #[cfg(feature = "source-serpapi")]
        registry.register(Arc::new(SerpApiSource::new(client.clone())));
        #[cfg(feature = "source-google-cse")]
        registry.register(Arc::new(GoogleCseSource::new(client.clone())));

        registry
    }

    /// Create a registry with no sources
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a source, replacing any existing source with the same id
    pub fn register(&mut self, source: Arc<dyn Source>) {
        match self.sources.iter().position(|s| s.id() == source.id()) {
            Some(idx) => self.sources[idx] = source,
            None => self.sources.push(source),
        }
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    /// Get a source by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(id)
            .ok_or_else(|| SourceError::InvalidRequest(format!("Source '{}' not found", id)))
    }

    /// Get all registered sources in registration order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    /// Get all source IDs
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id())
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Default backend specs for every source, in registration order
    pub fn backend_specs(&self) -> Vec<BackendSpec> {
        self.all().map(|s| s.backend_spec()).collect()
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
