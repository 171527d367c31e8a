//! Error types for the search, download and packaging stages.

use serde::Serialize;
use thiserror::Error;

use crate::models::BatchReport;

/// Why a single download failed
///
/// Recorded on a failed [`DownloadOutcome`](crate::models::DownloadOutcome);
/// a batch keeps going after any of these.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownloadError {
    #[error("Timed out waiting for the server")]
    Timeout,

    #[error("Server returned HTTP {code}")]
    HttpStatus { code: u16 },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Download cancelled")]
    Cancelled,
}

impl DownloadError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn io(err: &std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DownloadError::Timeout
        } else if let Some(status) = err.status() {
            DownloadError::HttpStatus {
                code: status.as_u16(),
            }
        } else {
            DownloadError::network(err.to_string())
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        DownloadError::io(&err)
    }
}

/// Hard failures of an aggregated search
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("Search query is empty")]
    EmptyQuery,

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),
}

/// Failures that end a batch
///
/// Apart from [`PackageError::ArchiveOpen`] these carry the outcomes
/// recorded before the batch stopped.
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Failed to open archive in {path}: {source}")]
    ArchiveOpen {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive: {source}")]
    ArchiveWrite {
        #[source]
        source: zip::result::ZipError,
        report: BatchReport,
    },

    #[error("Batch cancelled after {} item(s)", .report.outcomes.len())]
    Cancelled { report: BatchReport },
}

impl PackageError {
    /// The partial report, if this error carries one
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            PackageError::ArchiveOpen { .. } => None,
            PackageError::ArchiveWrite { report, .. } | PackageError::Cancelled { report } => Some(report),
        }
    }
}
