//! Download progress, per-item outcomes and batch reports.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::models::SearchResult;
use crate::pipeline::DownloadError;

/// Transfer progress of a single download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Bytes written so far
    pub bytes_done: u64,

    /// Expected size from `Content-Length`, if the server sent one
    pub total: Option<u64>,
}

impl Progress {
    pub fn new(bytes_done: u64, total: Option<u64>) -> Self {
        Self { bytes_done, total }
    }

    /// Fraction complete in `0.0..=1.0`, or `None` when the size is unknown
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some((self.bytes_done as f64 / total as f64).min(1.0)),
            None => None,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        self.fraction().is_none()
    }
}

/// Terminal state of one download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Success,
    Failed,
}

/// Result of attempting to download one selected item
///
/// Use [`DownloadOutcome::success`] or [`DownloadOutcome::failed`]; a success
/// always has a local path and never an error.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    /// The item that was requested
    pub request: SearchResult,

    pub status: DownloadStatus,

    /// Where the file was written
    pub local_path: Option<PathBuf>,

    /// Why the download failed
    pub error: Option<DownloadError>,

    /// Size of the written file
    pub bytes_written: u64,

    /// Hex SHA-256 of the written bytes
    pub sha256: Option<String>,
}

impl DownloadOutcome {
    pub fn success(
        request: SearchResult,
        local_path: PathBuf,
        bytes_written: u64,
        sha256: Option<String>,
    ) -> Self {
        Self {
            request,
            status: DownloadStatus::Success,
            local_path: Some(local_path),
            error: None,
            bytes_written,
            sha256,
        }
    }

    /// `bytes_written` records how much reached disk before the failure
    pub fn failed(request: SearchResult, error: DownloadError, bytes_written: u64) -> Self {
        Self {
            request,
            status: DownloadStatus::Failed,
            local_path: None,
            error: Some(error),
            bytes_written,
            sha256: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DownloadStatus::Success
    }

    /// Base filename of the downloaded file
    pub fn file_name(&self) -> Option<&str> {
        self.local_path
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
    }
}

/// Everything a batch produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// One outcome per item, in item order
    pub outcomes: Vec<DownloadOutcome>,

    /// Set only when at least one item succeeded and the archive was finalized
    pub archive_path: Option<PathBuf>,
}

impl BatchReport {
    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.successful()
    }

    /// Bytes written across successful downloads
    pub fn total_bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.bytes_written)
            .sum()
    }

    /// Check if all downloads succeeded (and there was at least one)
    pub fn is_all_success(&self) -> bool {
        !self.outcomes.is_empty() && self.failed() == 0
    }
}

/// What happened to one item in a batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Started,
    Transfer(Progress),
    Completed { bytes: u64 },
    Failed { reason: String },
}

/// Progress notification for one item of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    /// Zero-based position of the item
    pub index: usize,

    /// Number of items in the batch
    pub total: usize,

    /// Title of the item, for display
    pub title: String,

    pub event: BatchEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultKind;

    fn item(name: &str) -> SearchResult {
        SearchResult::new(
            name,
            format!("https://example.com/{}.pdf", name),
            "mock",
            ResultKind::DirectArtifact,
        )
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(Progress::new(50, Some(100)).fraction(), Some(0.5));
        assert_eq!(Progress::new(150, Some(100)).fraction(), Some(1.0));
        assert_eq!(Progress::new(0, Some(0)).fraction(), Some(1.0));
        assert!(Progress::new(10, None).is_indeterminate());
    }

    #[test]
    fn test_outcome_invariants() {
        let ok = DownloadOutcome::success(item("a"), PathBuf::from("/tmp/a.pdf"), 10, None);
        assert!(ok.is_success());
        assert!(ok.local_path.is_some() && ok.error.is_none());
        assert_eq!(ok.file_name(), Some("a.pdf"));

        let failed = DownloadOutcome::failed(item("b"), DownloadError::Timeout, 0);
        assert!(!failed.is_success());
        assert!(failed.local_path.is_none() && failed.error.is_some());
        assert_eq!(failed.file_name(), None);
    }

    #[test]
    fn test_batch_report_counts() {
        let report = BatchReport {
            outcomes: vec![
                DownloadOutcome::success(item("a"), PathBuf::from("a.pdf"), 1024, None),
                DownloadOutcome::success(item("b"), PathBuf::from("b.pdf"), 2048, None),
                DownloadOutcome::failed(item("c"), DownloadError::HttpStatus { code: 404 }, 0),
            ],
            archive_path: Some(PathBuf::from("bundle.zip")),
        };

        assert_eq!(report.successful(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total_bytes(), 3072);
        assert!(!report.is_all_success());
    }

    #[test]
    fn test_batch_report_empty() {
        let report = BatchReport::default();
        assert_eq!(report.successful(), 0);
        assert_eq!(report.total_bytes(), 0);
        assert!(!report.is_all_success());
    }
}
