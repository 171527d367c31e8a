//! Sequential batch download into a single ZIP archive.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::models::{BatchEvent, BatchProgress, BatchReport, Progress, SearchResult};
use crate::pipeline::{DownloadError, Downloader, PackageError};
use crate::utils::disambiguate;

/// Subdirectory of the work dir that receives downloads
pub const FILES_DIR: &str = "files";

/// Timestamped default name, `pdf-bundle-YYYYMMDD-HHMMSS.zip`
pub fn default_archive_name() -> String {
    format!("pdf-bundle-{}.zip", chrono::Local::now().format("%Y%m%d-%H%M%S"))
}

/// Downloads selected results one by one and bundles the successes
#[derive(Debug, Clone)]
pub struct BatchPackager {
    downloader: Downloader,
    archive_name: Option<String>,
}

impl BatchPackager {
    pub fn new(downloader: Downloader) -> Self {
        Self {
            downloader,
            archive_name: None,
        }
    }

    /// Use a fixed archive file name instead of a timestamped one
    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = Some(name.into());
        self
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    /// Download `items` into `work_dir/files/` and zip the successful ones
    ///
    /// Item failures are recorded and the batch moves on. The archive is only
    /// written to `work_dir` when at least one item succeeded; on cancellation
    /// or an archive error nothing is left behind but the downloaded files.
    pub async fn package_selected(
        &self,
        items: &[SearchResult],
        work_dir: &Path,
        on_item_progress: &(dyn Fn(BatchProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<BatchReport, PackageError> {
        let open_error = |source: io::Error| PackageError::ArchiveOpen {
            path: work_dir.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(work_dir).await.map_err(open_error)?;
        let scratch = tempfile::Builder::new()
            .prefix(".pdf-bundle-")
            .suffix(".zip.part")
            .tempfile_in(work_dir)
            .map_err(open_error)?;

        let files_dir = work_dir.join(FILES_DIR);
        let total = items.len();
        let mut writer = ZipWriter::new(scratch);
        let mut members: HashSet<String> = HashSet::with_capacity(total);
        // Names written under files/ by this batch; later items must not touch them
        let mut claimed: HashSet<String> = HashSet::with_capacity(total);
        let mut report = BatchReport::default();

        tracing::info!(items = total, work_dir = %work_dir.display(), "Starting batch");

        for (index, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(completed = report.outcomes.len(), "Batch cancelled");
                return Err(PackageError::Cancelled { report });
            }

            let emit = |event: BatchEvent| {
                on_item_progress(BatchProgress {
                    index,
                    total,
                    title: item.title.clone(),
                    event,
                })
            };

            emit(BatchEvent::Started);
            let on_transfer = |p: Progress| emit(BatchEvent::Transfer(p));

            let outcome = self
                .downloader
                .fetch_claiming(item, &files_dir, &claimed, &on_transfer, cancel)
                .await;

            if outcome.error == Some(DownloadError::Cancelled) {
                report.outcomes.push(outcome);
                tracing::info!(completed = report.outcomes.len(), "Batch cancelled");
                return Err(PackageError::Cancelled { report });
            }

            let pending_member = match (&outcome.local_path, outcome.file_name()) {
                (Some(path), Some(name)) => {
                    claimed.insert(name.to_string());
                    let member = disambiguate(name, &members);
                    members.insert(member.clone());
                    Some((member, path.clone()))
                }
                _ => None,
            };

            let event = match &outcome.error {
                Some(err) => BatchEvent::Failed {
                    reason: err.to_string(),
                },
                None => BatchEvent::Completed {
                    bytes: outcome.bytes_written,
                },
            };
            report.outcomes.push(outcome);

            if let Some((member, path)) = pending_member {
                tracing::debug!(member = %member, "Adding archive member");
                let (returned, written) = append_member(writer, member, path).await;
                if let Err(source) = written {
                    return Err(PackageError::ArchiveWrite { source, report });
                }
                match returned {
                    Some(w) => writer = w,
                    None => {
                        return Err(PackageError::ArchiveWrite {
                            source: ZipError::Io(io::Error::other("archive writer task failed")),
                            report,
                        })
                    }
                }
            }

            emit(event);
        }

        if report.successful() == 0 {
            tracing::info!(items = total, "No successful downloads, archive discarded");
            return Ok(report);
        }

        let archive_path = work_dir.join(
            self.archive_name
                .clone()
                .unwrap_or_else(default_archive_name),
        );

        match finish_archive(writer, archive_path.clone()).await {
            Ok(()) => {
                tracing::info!(
                    archive = %archive_path.display(),
                    succeeded = report.successful(),
                    failed = report.failed(),
                    "Archive written"
                );
                report.archive_path = Some(archive_path);
                Ok(report)
            }
            Err(source) => Err(PackageError::ArchiveWrite { source, report }),
        }
    }
}

fn add_file(writer: &mut ZipWriter<NamedTempFile>, member: &str, path: &Path) -> Result<(), ZipError> {
    let mut file = std::fs::File::open(path)?;
    let size = file.metadata()?.len();

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .large_file(size >= u32::MAX as u64);

    writer.start_file(member, options)?;
    io::copy(&mut file, writer)?;
    Ok(())
}

/// Append one file on the blocking pool, handing the writer back
///
/// The writer is `None` only if the blocking task itself died.
async fn append_member(
    mut writer: ZipWriter<NamedTempFile>,
    member: String,
    path: PathBuf,
) -> (Option<ZipWriter<NamedTempFile>>, Result<(), ZipError>) {
    let task = tokio::task::spawn_blocking(move || {
        let result = add_file(&mut writer, &member, &path);
        (writer, result)
    });

    match task.await {
        Ok((writer, result)) => (Some(writer), result),
        Err(e) => (None, Err(ZipError::Io(io::Error::other(e.to_string())))),
    }
}

/// Write the central directory and move the archive into place
async fn finish_archive(writer: ZipWriter<NamedTempFile>, destination: PathBuf) -> Result<(), ZipError> {
    tokio::task::spawn_blocking(move || {
        let scratch = writer.finish()?;
        scratch
            .persist(&destination)
            .map_err(|e| ZipError::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| ZipError::Io(io::Error::other(e.to_string())))?
}
