//! The search → select → download → archive pipeline.
//!
//! - [`Aggregator`] runs a query against several backends at once and merges
//!   the deduplicated results.
//! - [`Downloader`] streams one link to disk.
//! - [`BatchPackager`] downloads a caller-chosen selection sequentially and
//!   bundles the successes into one ZIP archive.
//!
//! # Example
//!
//! ```rust,no_run
//! use pdf_harvest::models::Credentials;
//! use pdf_harvest::pipeline::{Aggregator, BatchPackager, Downloader};
//! use pdf_harvest::sources::SourceRegistry;
//! use pdf_harvest::utils::HttpClient;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let aggregator = Aggregator::new(SourceRegistry::new(&client));
//! let report = aggregator.search_all("atomic habits", &Credentials::new()).await?;
//!
//! let selected: Vec<_> = report.direct_artifacts().take(2).cloned().collect();
//! let packager = BatchPackager::new(Downloader::new(client));
//! let batch = packager
//!     .package_selected(&selected, std::path::Path::new("downloads"), &|_| {}, &CancellationToken::new())
//!     .await?;
//! println!("archive: {:?}", batch.archive_path);
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod downloader;
mod error;
mod packager;

pub use aggregator::Aggregator;
pub use downloader::{
    CollisionPolicy, DownloadOptions, DownloadedFile, Downloader, CHUNK_SIZE, DEFAULT_DOWNLOAD_TIMEOUT,
};
pub use error::{AggregateError, DownloadError, PackageError};
pub use packager::{default_archive_name, BatchPackager, FILES_DIR};
