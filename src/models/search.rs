//! Search request, backend configuration and aggregated report models.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::models::SearchResult;
use crate::sources::AdapterError;

/// Default number of results requested from each backend
pub const DEFAULT_MAX_RESULTS: usize = 8;

/// Default per-backend search timeout
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(20);

/// SerpApi key credential name
pub const SERPAPI_API_KEY: &str = "SERPAPI_API_KEY";
/// Google Custom Search API key credential name
pub const GOOGLE_CSE_API_KEY: &str = "GOOGLE_CSE_API_KEY";
/// Google Custom Search engine id credential name
pub const GOOGLE_CSE_CX: &str = "GOOGLE_CSE_CX";

/// API keys and similar secrets, keyed by credential name
///
/// Values never show up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    /// Create an empty credential set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a credential
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style [`Credentials::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a credential; blank values count as absent
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// Names from `required` that have no usable value
    pub fn missing<'a>(&self, required: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        required
            .into_iter()
            .filter(|name| self.get(name).is_none())
            .cloned()
            .collect()
    }

    /// Copy of only the named credentials
    pub fn subset<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Self {
        let mut subset = Self::new();
        for name in names {
            if let Some(value) = self.values.get(name) {
                subset.insert(name.clone(), value.clone());
            }
        }
        subset
    }

    /// Credential names present in this set
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

/// Query handed to a single backend adapter
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Trimmed query text
    pub query: String,

    /// Upper bound on results the adapter should return
    pub max_results: usize,

    /// Credentials the adapter declared as required
    pub credentials: Credentials,
}

impl SearchQuery {
    /// Create a new query with default limits and no credentials
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: DEFAULT_MAX_RESULTS,
            credentials: Credentials::new(),
        }
    }

    /// Set maximum results
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Set credentials
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// How the aggregator should treat one backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    /// Adapter id in the source registry
    pub name: String,

    /// Disabled backends are not attempted
    pub enabled: bool,

    /// Credential names that must be present for the backend to run
    pub required_credentials: BTreeSet<String>,

    /// Upper bound on the backend's search call
    pub timeout: Duration,
}

impl BackendSpec {
    /// An enabled backend with no credential requirements and the default timeout
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            required_credentials: BTreeSet::new(),
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Add a required credential name
    pub fn require(mut self, credential: impl Into<String>) -> Self {
        self.required_credentials.insert(credential.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// What happened to one backend during a search
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendStatus {
    /// The adapter answered; `results` counts what it returned before deduplication
    Completed { results: usize },
    /// Not attempted because credentials were missing
    Skipped { missing_credentials: Vec<String> },
    /// Not attempted because the backend is switched off
    Disabled,
    /// The adapter errored or timed out
    Failed { error: AdapterError },
}

impl BackendStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, BackendStatus::Failed { .. })
    }
}

/// Per-backend line of a [`SearchReport`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendReport {
    pub name: String,
    #[serde(flatten)]
    pub status: BackendStatus,
}

/// Overall outcome of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchStatus {
    Found { count: usize },
    /// No backend produced a usable result
    NoResults,
}

/// Deduplicated results of one aggregated search
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    /// Query that was executed
    pub query: String,

    /// Results grouped by backend order, then adapter order
    pub results: Vec<SearchResult>,

    /// One entry per requested backend, in configured order
    pub backends: Vec<BackendReport>,
}

impl SearchReport {
    pub fn status(&self) -> SearchStatus {
        if self.results.is_empty() {
            SearchStatus::NoResults
        } else {
            SearchStatus::Found {
                count: self.results.len(),
            }
        }
    }

    /// Backends that failed or timed out
    pub fn failures(&self) -> impl Iterator<Item = (&str, &AdapterError)> {
        self.backends.iter().filter_map(|b| match &b.status {
            BackendStatus::Failed { error } => Some((b.name.as_str(), error)),
            _ => None,
        })
    }

    /// Backends skipped for missing credentials
    pub fn skipped(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.backends.iter().filter_map(|b| match &b.status {
            BackendStatus::Skipped {
                missing_credentials,
            } => Some((b.name.as_str(), missing_credentials.as_slice())),
            _ => None,
        })
    }

    /// Results whose link should serve the file itself
    pub fn direct_artifacts(&self) -> impl Iterator<Item = &SearchResult> {
        self.results.iter().filter(|r| r.is_direct())
    }
}
