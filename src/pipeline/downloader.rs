//! Streaming single-file download with progress and cancellation.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::models::{DownloadOutcome, Progress, SearchResult};
use crate::pipeline::DownloadError;
use crate::utils::{disambiguate, resolve_filename, validate_url, HttpClient, DEFAULT_MAX_FILENAME_LEN};

/// Bytes written to disk per step; progress is reported after each
pub const CHUNK_SIZE: usize = 8192;

/// Bound on the request phase and on each body chunk wait
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15);

const PDF_MAGIC: &[u8] = b"%PDF-";

/// What to do when the resolved filename already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace the existing file
    #[default]
    Overwrite,
    /// Write to `name (1).pdf`, `name (2).pdf`, ...
    Rename,
    /// Keep the existing file and report it as the download
    Skip,
}

impl std::fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CollisionPolicy::Overwrite => "overwrite",
            CollisionPolicy::Rename => "rename",
            CollisionPolicy::Skip => "skip",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(CollisionPolicy::Overwrite),
            "rename" => Ok(CollisionPolicy::Rename),
            "skip" => Ok(CollisionPolicy::Skip),
            other => Err(format!(
                "unknown collision policy '{}' (expected overwrite, rename or skip)",
                other
            )),
        }
    }
}

/// Tunables for [`Downloader`]
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub timeout: Duration,
    pub max_filename_len: usize,
    pub collision: CollisionPolicy,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            max_filename_len: DEFAULT_MAX_FILENAME_LEN,
            collision: CollisionPolicy::default(),
        }
    }
}

/// A file that is fully on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub bytes_written: u64,
    /// Hex SHA-256 of the file contents
    pub sha256: String,
    /// Set when [`CollisionPolicy::Skip`] kept an existing file
    pub reused_existing: bool,
}

struct Failure {
    error: DownloadError,
    bytes_written: u64,
}

impl Failure {
    fn partial(error: DownloadError, bytes_written: u64) -> Self {
        Self {
            error,
            bytes_written,
        }
    }
}

impl From<DownloadError> for Failure {
    fn from(error: DownloadError) -> Self {
        Self::partial(error, 0)
    }
}

enum Target {
    Write(PathBuf),
    Existing(PathBuf),
}

/// Downloads one URL at a time into a directory
#[derive(Debug, Clone)]
pub struct Downloader {
    client: HttpClient,
    options: DownloadOptions,
}

impl Downloader {
    pub fn new(client: HttpClient) -> Self {
        Self::with_options(client, DownloadOptions::default())
    }

    pub fn with_options(client: HttpClient, options: DownloadOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Download a selected result and describe what happened
    ///
    /// Never fails: errors become a `Failed` outcome. A partial file is left
    /// in place on failure.
    pub async fn fetch(
        &self,
        request: &SearchResult,
        destination_dir: &Path,
        on_progress: &(dyn Fn(Progress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> DownloadOutcome {
        self.fetch_claiming(request, destination_dir, &HashSet::new(), on_progress, cancel)
            .await
    }

    /// Like [`Downloader::fetch`], but never writes to or reuses a name in
    /// `claimed`; such names are disambiguated whatever the collision policy
    pub(crate) async fn fetch_claiming(
        &self,
        request: &SearchResult,
        destination_dir: &Path,
        claimed: &HashSet<String>,
        on_progress: &(dyn Fn(Progress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> DownloadOutcome {
        match self
            .fetch_inner(&request.link, destination_dir, claimed, on_progress, cancel)
            .await
        {
            Ok(file) => DownloadOutcome::success(
                request.clone(),
                file.path,
                file.bytes_written,
                Some(file.sha256),
            ),
            Err(failure) => {
                tracing::warn!(link = %request.link, error = %failure.error, "Download failed");
                DownloadOutcome::failed(request.clone(), failure.error, failure.bytes_written)
            }
        }
    }

    /// Download `url` into `destination_dir`
    pub async fn fetch_url(
        &self,
        url: &str,
        destination_dir: &Path,
        on_progress: &(dyn Fn(Progress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<DownloadedFile, DownloadError> {
        self.fetch_inner(url, destination_dir, &HashSet::new(), on_progress, cancel)
            .await
            .map_err(|f| f.error)
    }

    async fn fetch_inner(
        &self,
        url: &str,
        destination_dir: &Path,
        claimed: &HashSet<String>,
        on_progress: &(dyn Fn(Progress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<DownloadedFile, Failure> {
        let parsed = validate_url(url).map_err(|e| DownloadError::InvalidUrl {
            message: e.to_string(),
        })?;

        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled.into());
        }

        tokio::fs::create_dir_all(destination_dir)
            .await
            .map_err(DownloadError::from)?;

        tracing::debug!(url = %parsed, "Requesting file");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled.into()),
            sent = tokio::time::timeout(self.options.timeout, self.client.get(parsed.as_str()).send()) => {
                match sent {
                    Err(_) => return Err(DownloadError::Timeout.into()),
                    Ok(result) => result.map_err(DownloadError::from)?,
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                code: status.as_u16(),
            }
            .into());
        }

        let total = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let name = resolve_filename(disposition.as_deref(), url, self.options.max_filename_len);

        let path = match self.target(destination_dir, &name, claimed).await? {
            Target::Write(path) => path,
            Target::Existing(path) => {
                tracing::info!(path = %path.display(), "Keeping existing file");
                return Ok(reuse_existing(path).await?);
            }
        };

        let mut file = File::create(&path).await.map_err(DownloadError::from)?;
        let mut stream = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::with_capacity(CHUNK_SIZE * 2);
        let mut hasher = Sha256::new();
        let mut head: Vec<u8> = Vec::with_capacity(PDF_MAGIC.len());
        let mut written: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Failure::partial(DownloadError::Cancelled, written)),
                next = tokio::time::timeout(self.options.timeout, stream.next()) => next,
            };

            let bytes = match next {
                Err(_) => return Err(Failure::partial(DownloadError::Timeout, written)),
                Ok(None) => break,
                Ok(Some(Err(e))) => return Err(Failure::partial(DownloadError::from(e), written)),
                Ok(Some(Ok(bytes))) => bytes,
            };

            pending.extend_from_slice(&bytes);

            while pending.len() >= CHUNK_SIZE {
                if cancel.is_cancelled() {
                    return Err(Failure::partial(DownloadError::Cancelled, written));
                }

                let chunk: Vec<u8> = pending.drain(..CHUNK_SIZE).collect();
                write_chunk(&mut file, &mut hasher, &mut head, &chunk)
                    .await
                    .map_err(|e| Failure::partial(DownloadError::from(e), written))?;
                written += chunk.len() as u64;
                on_progress(Progress::new(written, total));
            }
        }

        if !pending.is_empty() {
            write_chunk(&mut file, &mut hasher, &mut head, &pending)
                .await
                .map_err(|e| Failure::partial(DownloadError::from(e), written))?;
            written += pending.len() as u64;
            on_progress(Progress::new(written, total));
        } else if written == 0 {
            on_progress(Progress::new(0, total));
        }

        file.flush()
            .await
            .map_err(|e| Failure::partial(DownloadError::from(e), written))?;

        if written > 0 && !head.starts_with(PDF_MAGIC) {
            tracing::warn!(
                path = %path.display(),
                "Downloaded file does not look like a PDF but was saved with a .pdf name"
            );
        }

        tracing::debug!(path = %path.display(), bytes = written, "Download complete");

        Ok(DownloadedFile {
            path,
            bytes_written: written,
            sha256: format!("{:x}", hasher.finalize()),
            reused_existing: false,
        })
    }

    async fn target(
        &self,
        dir: &Path,
        name: &str,
        claimed: &HashSet<String>,
    ) -> Result<Target, DownloadError> {
        if claimed.contains(name) {
            return Ok(Target::Write(renamed(dir, name, claimed).await?));
        }

        let path = dir.join(name);
        let exists = tokio::fs::try_exists(&path).await?;

        if !exists {
            return Ok(Target::Write(path));
        }

        match self.options.collision {
            CollisionPolicy::Overwrite => Ok(Target::Write(path)),
            CollisionPolicy::Skip => Ok(Target::Existing(path)),
            CollisionPolicy::Rename => Ok(Target::Write(renamed(dir, name, claimed).await?)),
        }
    }
}

/// First free `name (n).ext` in `dir`, also avoiding `claimed`
async fn renamed(dir: &Path, name: &str, claimed: &HashSet<String>) -> Result<PathBuf, DownloadError> {
    let mut taken = claimed.clone();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(existing) = entry.file_name().to_str() {
            taken.insert(existing.to_string());
        }
    }
    Ok(dir.join(disambiguate(name, &taken)))
}

async fn write_chunk(
    file: &mut File,
    hasher: &mut Sha256,
    head: &mut Vec<u8>,
    chunk: &[u8],
) -> std::io::Result<()> {
    file.write_all(chunk).await?;
    hasher.update(chunk);
    if head.len() < PDF_MAGIC.len() {
        let needed = PDF_MAGIC.len() - head.len();
        head.extend_from_slice(&chunk[..needed.min(chunk.len())]);
    }
    Ok(())
}

async fn reuse_existing(path: PathBuf) -> Result<DownloadedFile, DownloadError> {
    let mut file = File::open(&path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut size: u64 = 0;

    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        size += read as u64;
    }

    Ok(DownloadedFile {
        bytes_written: size,
        sha256: format!("{:x}", hasher.finalize()),
        path,
        reused_existing: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultKind;
    use crate::utils::HttpSettings;
    use std::sync::Mutex;

    fn client() -> HttpClient {
        HttpClient::with_settings(&HttpSettings {
            requests_per_second: None,
            ..Default::default()
        })
        .unwrap()
    }

    fn no_progress(_: Progress) {}

    fn pdf_body(len: usize) -> Vec<u8> {
        let mut body = b"%PDF-1.7\n".to_vec();
        body.extend((0..len).map(|i| (i % 251) as u8));
        body.truncate(len);
        body
    }

    #[test]
    fn test_collision_policy_parsing() {
        assert_eq!("Rename".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Rename));
        assert_eq!(CollisionPolicy::default(), CollisionPolicy::Overwrite);
        assert!("merge".parse::<CollisionPolicy>().is_err());
        assert_eq!(CollisionPolicy::Skip.to_string(), "skip");
    }

    #[tokio::test]
    async fn test_bodies_are_written_byte_identical() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new(client());

        for len in [0usize, 1, 20_000] {
            let body = pdf_body(len);
            let path = format!("/file-{}.pdf", len);
            let _mock = server
                .mock("GET", path.as_str())
                .with_status(200)
                .with_body(body.clone())
                .create_async()
                .await;

            let file = downloader
                .fetch_url(
                    &format!("{}{}", server.url(), path),
                    dir.path(),
                    &no_progress,
                    &CancellationToken::new(),
                )
                .await
                .unwrap();

            let on_disk = std::fs::read(&file.path).unwrap();
            assert_eq!(on_disk, body);
            assert_eq!(file.bytes_written, len as u64);
            assert_eq!(file.sha256, format!("{:x}", Sha256::digest(&body)));
        }
    }

    #[tokio::test]
    async fn test_progress_reported_per_chunk() {
        let mut server = mockito::Server::new_async().await;
        let body = pdf_body(20_000);
        let _mock = server
            .mock("GET", "/big.pdf")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let seen = Mutex::new(Vec::new());
        let on_progress = |p: Progress| seen.lock().unwrap().push(p);
        let dir = tempfile::tempdir().unwrap();

        Downloader::new(client())
            .fetch_url(
                &format!("{}/big.pdf", server.url()),
                dir.path(),
                &on_progress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let seen = seen.into_inner().unwrap();
        let done: Vec<u64> = seen.iter().map(|p| p.bytes_done).collect();
        assert_eq!(done, vec![8192, 16384, 20_000]);
        assert_eq!(seen[2].total, Some(20_000));
        assert_eq!(seen[2].fraction(), Some(1.0));
    }

    #[tokio::test]
    async fn test_content_disposition_name_wins() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/download")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-disposition", r#"attachment; filename="report.pdf""#)
            .with_body("%PDF-1.4")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = Downloader::new(client())
            .fetch_url(
                &format!("{}/download?id=7", server.url()),
                dir.path(),
                &no_progress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(file.path, dir.path().join("report.pdf"));
    }

    #[tokio::test]
    async fn test_name_from_url_and_suffix() {
        let mut server = mockito::Server::new_async().await;
        let _a = server
            .mock("GET", "/books/Atomic%20Habits.pdf")
            .with_status(200)
            .with_body("%PDF-1.4")
            .create_async()
            .await;
        let _b = server
            .mock("GET", "/get/thesis")
            .with_status(200)
            .with_body("<html>not a pdf</html>")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new(client());
        let cancel = CancellationToken::new();

        let a = downloader
            .fetch_url(
                &format!("{}/books/Atomic%20Habits.pdf", server.url()),
                dir.path(),
                &no_progress,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(a.path.file_name().unwrap(), "Atomic Habits.pdf");

        let b = downloader
            .fetch_url(&format!("{}/get/thesis", server.url()), dir.path(), &no_progress, &cancel)
            .await
            .unwrap();
        assert_eq!(b.path.file_name().unwrap(), "thesis.pdf");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.pdf")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = Downloader::new(client())
            .fetch_url(
                &format!("{}/missing.pdf", server.url()),
                dir.path(),
                &no_progress,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, DownloadError::HttpStatus { code: 404 });
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = Downloader::new(client())
            .fetch_url("ftp://example.com/a.pdf", dir.path(), &no_progress, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = SearchResult::new("a", "https://example.com/a.pdf", "m", ResultKind::DirectArtifact);
        let outcome = Downloader::new(client())
            .fetch(&request, dir.path(), &no_progress, &cancel)
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.error, Some(DownloadError::Cancelled));
    }

    #[tokio::test]
    async fn test_request_phase_timeout() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::with_options(
            client(),
            DownloadOptions {
                timeout: Duration::from_millis(200),
                ..Default::default()
            },
        );

        let err = downloader
            .fetch_url(
                &format!("http://{}/slow.pdf", addr),
                dir.path(),
                &no_progress,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, DownloadError::Timeout);
        server.abort();
    }

    #[tokio::test]
    async fn test_collision_policies() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/paper.pdf")
            .with_status(200)
            .with_body("%PDF-new")
            .expect(3)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("paper.pdf"), b"%PDF-old").unwrap();
        let url = format!("{}/paper.pdf", server.url());
        let cancel = CancellationToken::new();

        let rename = Downloader::with_options(
            client(),
            DownloadOptions {
                collision: CollisionPolicy::Rename,
                ..Default::default()
            },
        );
        let renamed = rename.fetch_url(&url, dir.path(), &no_progress, &cancel).await.unwrap();
        assert_eq!(renamed.path, dir.path().join("paper (1).pdf"));

        let skip = Downloader::with_options(
            client(),
            DownloadOptions {
                collision: CollisionPolicy::Skip,
                ..Default::default()
            },
        );
        // The name can come from response headers, so Skip still sends the
        // request and only leaves the body unread
        let kept = skip.fetch_url(&url, dir.path(), &no_progress, &cancel).await.unwrap();
        assert!(kept.reused_existing);
        assert_eq!(kept.path, dir.path().join("paper.pdf"));
        assert_eq!(kept.bytes_written, 8);

        let overwrite = Downloader::new(client());
        overwrite.fetch_url(&url, dir.path(), &no_progress, &cancel).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("paper.pdf")).unwrap(), b"%PDF-new");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_claimed_names_are_never_reused() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/paper.pdf")
            .with_status(200)
            .with_body("%PDF-fresh")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("paper.pdf"), b"%PDF-earlier-item").unwrap();
        let claimed: HashSet<String> = ["paper.pdf".to_string()].into_iter().collect();
        let request = SearchResult::new(
            "paper",
            format!("{}/paper.pdf", server.url()),
            "m",
            ResultKind::DirectArtifact,
        );

        for policy in [CollisionPolicy::Skip, CollisionPolicy::Overwrite] {
            let downloader = Downloader::with_options(
                client(),
                DownloadOptions {
                    collision: policy,
                    ..Default::default()
                },
            );
            let outcome = downloader
                .fetch_claiming(&request, dir.path(), &claimed, &no_progress, &CancellationToken::new())
                .await;

            let path = outcome.local_path.clone().unwrap();
            assert_ne!(path, dir.path().join("paper.pdf"), "{} reused a claimed name", policy);
            assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-fresh");
            assert_eq!(outcome.bytes_written, std::fs::metadata(&path).unwrap().len());
            std::fs::remove_file(&path).unwrap();
        }

        assert_eq!(
            std::fs::read(dir.path().join("paper.pdf")).unwrap(),
            b"%PDF-earlier-item"
        );
    }

    #[tokio::test]
    async fn test_skip_hashes_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let contents = pdf_body(3 * CHUNK_SIZE + 17);
        let path = dir.path().join("kept.pdf");
        std::fs::write(&path, &contents).unwrap();

        let file = reuse_existing(path.clone()).await.unwrap();
        assert!(file.reused_existing);
        assert_eq!(file.bytes_written, contents.len() as u64);
        assert_eq!(file.sha256, format!("{:x}", Sha256::digest(&contents)));
    }

    #[tokio::test]
    async fn test_fetch_outcome_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/ok.pdf")
            .with_status(200)
            .with_body("%PDF-1.4 hello")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = SearchResult::new(
            "ok",
            format!("{}/ok.pdf", server.url()),
            "m",
            ResultKind::DirectArtifact,
        );
        let outcome = Downloader::new(client())
            .fetch(&request, &dir.path().join("nested"), &no_progress, &CancellationToken::new())
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.bytes_written, 14);
        assert_eq!(outcome.file_name(), Some("ok.pdf"));
        assert!(outcome.sha256.is_some());
    }
}
