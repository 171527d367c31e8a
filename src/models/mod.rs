//! Core data models for search results, backend configuration and downloads.

mod download;
mod result;
mod search;

pub use download::{
    BatchEvent, BatchProgress, BatchReport, DownloadOutcome, DownloadStatus, Progress,
};
pub use result::{ResultKind, SearchResult};
pub use search::{
    BackendReport, BackendSpec, BackendStatus, Credentials, SearchQuery, SearchReport,
    SearchStatus, DEFAULT_BACKEND_TIMEOUT, DEFAULT_MAX_RESULTS, GOOGLE_CSE_API_KEY, GOOGLE_CSE_CX,
    SERPAPI_API_KEY,
};
