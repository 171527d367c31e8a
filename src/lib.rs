//! # pdf-harvest
//!
//! Search several backends for PDF links, pick the ones you want, download
//! them and get a single ZIP archive back.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (SearchResult, SearchReport, BatchReport, etc.)
//! - [`sources`]: Search backend adapters behind the [`Source`] trait
//! - [`pipeline`]: Aggregated search, streaming downloads and batch packaging
//! - [`utils`]: HTTP client, deduplication, filenames and display helpers
//! - [`config`]: Configuration management
//! - [`ui`]: Terminal rendering used by the CLI

pub mod config;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use models::{BatchReport, DownloadOutcome, ResultKind, SearchReport, SearchResult};
pub use pipeline::{Aggregator, BatchPackager, Downloader};
pub use sources::{Source, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
