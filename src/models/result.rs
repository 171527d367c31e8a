//! Search result model shared by every backend.

use serde::{Deserialize, Serialize};

/// How a result's link is expected to behave when fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// The link serves the target file itself
    DirectArtifact,
    /// The link leads to a page that needs further navigation
    LandingPage,
}

impl ResultKind {
    /// Short label used in listings
    pub fn label(&self) -> &'static str {
        match self {
            ResultKind::DirectArtifact => "pdf",
            ResultKind::LandingPage => "page",
        }
    }
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A candidate link found by one backend
///
/// Results are immutable once an adapter hands them over. The title is kept
/// verbatim; truncating it for display is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Free-text title as reported by the backend
    pub title: String,

    /// Absolute URL of the candidate
    pub link: String,

    /// Name of the backend that produced this result
    pub source_name: String,

    /// Whether the link is a direct file or a landing page
    pub kind: ResultKind,

    /// Short description from the backend, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl SearchResult {
    /// Create a new result
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        source_name: impl Into<String>,
        kind: ResultKind,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            source_name: source_name.into(),
            kind,
            snippet: None,
        }
    }

    /// Attach a snippet, ignoring blank text
    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        let snippet = snippet.into();
        let trimmed = snippet.trim();
        if !trimmed.is_empty() {
            self.snippet = Some(trimmed.to_string());
        }
        self
    }

    /// Whether the link is expected to serve the file directly
    pub fn is_direct(&self) -> bool {
        self.kind == ResultKind::DirectArtifact
    }

    /// Whether the link is non-empty and parses as an absolute http(s) URL
    pub fn has_valid_link(&self) -> bool {
        let link = self.link.trim();
        if link.is_empty() {
            return false;
        }
        match url::Url::parse(link) {
            Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.has_host(),
            Err(_) => false,
        }
    }
}
