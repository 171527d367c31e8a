//! Mock source for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::models::{ResultKind, SearchQuery, SearchResult};
use crate::sources::{Source, SourceCapabilities, SourceError};

/// A mock source that returns predefined results, fails, or stalls on demand.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    kind: ResultKind,
    required: Vec<&'static str>,
    results: Mutex<Vec<SearchResult>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
}

impl MockSource {
    /// Create a new mock source with id "mock".
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Create a mock source with the given id; its display name is the same.
    pub fn named(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: ResultKind::DirectArtifact,
            required: Vec::new(),
            results: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    /// Mark every result of this source as a landing page.
    pub fn landing_pages(mut self) -> Self {
        self.kind = ResultKind::LandingPage;
        self
    }

    /// Declare a credential this source needs.
    pub fn requiring(mut self, credential: &'static str) -> Self {
        self.required.push(credential);
        self
    }

    /// Set the links to return; titles are derived from the links.
    pub fn with_links(self, links: &[&str]) -> Self {
        let results = links.iter().map(|link| make_result(link, &self.id, self.kind)).collect();
        self.set_results(results);
        self
    }

    /// Set the results to return.
    pub fn set_results(&self, results: Vec<SearchResult>) {
        let mut guard = lock(&self.results);
        *guard = results;
    }

    /// Make every search fail with the given message.
    pub fn fail_with(self, message: &str) -> Self {
        *lock(&self.failure) = Some(message.to_string());
        self
    }

    /// Sleep before answering.
    pub fn delay(self, delay: Duration) -> Self {
        *lock(&self.delay) = delay;
        self
    }

    /// Number of times `search` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> SourceCapabilities {
        match self.kind {
            ResultKind::DirectArtifact => SourceCapabilities::SEARCH | SourceCapabilities::DIRECT_LINKS,
            ResultKind::LandingPage => SourceCapabilities::SEARCH | SourceCapabilities::LANDING_PAGES,
        }
    }

    fn required_credentials(&self) -> &[&'static str] {
        &self.required
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = lock(&self.failure).clone() {
            return Err(SourceError::Api(message));
        }

        let guard = lock(&self.results);
        Ok(guard.iter().take(query.max_results).cloned().collect())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Helper function to create a result for testing.
pub fn make_result(link: &str, source_name: &str, kind: ResultKind) -> SearchResult {
    let title = link
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(link)
        .to_string();
    SearchResult::new(title, link, source_name, kind)
}
