//! Utility modules supporting the search and download pipeline.
//!
//! - [`HttpClient`]: shared HTTP client with a browser user agent and rate limiting
//! - [`deduplicate_results`]: drop results whose normalized link was already seen
//! - [`resolve_filename`]: derive a safe on-disk name for a download
//! - [`validate_query`] / [`validate_url`]: input checks for the CLI and pipeline
//!
//! # Deduplication
//!
//! ```rust
//! use pdf_harvest::models::{ResultKind, SearchResult};
//! use pdf_harvest::utils::deduplicate_results;
//!
//! let results = vec![
//!     SearchResult::new("A", "https://example.com/a.pdf", "duckduckgo", ResultKind::DirectArtifact),
//!     SearchResult::new("A", "https://example.com/a.pdf?ref=x", "serpapi", ResultKind::DirectArtifact),
//! ];
//! assert_eq!(deduplicate_results(results).len(), 1);
//! ```
//!
//! # Filenames
//!
//! ```rust
//! use pdf_harvest::utils::resolve_filename;
//!
//! let name = resolve_filename(None, "https://example.com/books/Atomic%20Habits.pdf", 50);
//! assert_eq!(name, "Atomic Habits.pdf");
//! ```

mod dedup;
mod display;
mod filename;
mod http;
mod validate;

pub use dedup::{deduplicate_results, normalize_link};
pub use display::{
    calculate_dynamic_column_widths, display_width, format_file_size, format_title, is_terminal,
    result_table_columns, terminal_info, terminal_width, truncate_at_word, truncate_with_ellipsis,
    ColumnConfig, Terminal, DEFAULT_WIDTH,
};
pub use filename::{
    disambiguate, filename_from_content_disposition, filename_from_url, has_pdf_suffix,
    resolve_filename, sanitize_filename, DEFAULT_MAX_FILENAME_LEN, FALLBACK_FILENAME,
};
pub use http::{HttpClient, HttpSettings, RateLimitedRequestBuilder, BROWSER_USER_AGENT};
pub use validate::{validate_query, validate_url, ValidationError};
