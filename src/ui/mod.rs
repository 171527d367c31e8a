//! Terminal presentation for the CLI: colored status lines, result tables and
//! progress bars.
//!
//! Nothing here talks to the network or touches the pipeline's state; the
//! binary hands finished values in and these helpers render them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;

use crate::models::{
    BackendStatus, BatchEvent, BatchProgress, BatchReport, Progress, ResultKind, SearchReport,
    SearchResult,
};
use crate::utils::{format_file_size, format_title, result_table_columns, truncate_with_ellipsis};

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Download,
    Search,
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Download => "↓",
        Status::Search => "🔍",
    }
}

/// Icon shown next to a backend name.
pub fn source_icon(source: &str) -> &'static str {
    match source.to_lowercase().as_str() {
        "duckduckgo" => "🦆",
        "arxiv" => "📝",
        "gutenberg" | "project gutenberg" => "📚",
        "serpapi" | "google_cse" | "google cse" => "🔎",
        _ => "📄",
    }
}

/// Render a status line with a colored icon.
pub fn status_line(status: Status, msg: &str) -> String {
    let icon = status_icon(status);
    match status {
        Status::Success => format!("{} {}", icon.green().bold(), msg),
        Status::Error => format!("{} {}", icon.red().bold(), msg),
        Status::Warning => format!("{} {}", icon.yellow().bold(), msg),
        Status::Info => format!("{} {}", icon.cyan().bold(), msg),
        Status::Download => format!("{} {}", icon.magenta(), msg),
        Status::Search => format!("{} {}", icon.yellow(), msg),
    }
}

/// Print a styled status message to stdout.
pub fn print_status(status: Status, msg: &str) {
    println!("{}", status_line(status, msg));
}

/// Print a styled status message to stderr.
pub fn eprint_status(status: Status, msg: &str) {
    eprintln!("{}", status_line(status, msg));
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Print search results header.
pub fn print_search_header(query: &str, count: usize, duration: Duration) {
    println!();
    println!(
        "{} Search results for: \"{}\"",
        status_icon(Status::Search).yellow().bold(),
        query.cyan().bold()
    );
    println!(
        "{} Found {} links in {:.2}s",
        "─".repeat(30).dimmed(),
        count.to_string().green().bold(),
        duration.as_secs_f64()
    );
    println!();
}

/// Build the numbered result table, sized to `terminal_width`.
///
/// Row numbers start at 1 and are what `package --select` expects.
pub fn results_table(results: &[SearchResult], terminal_width: usize) -> Table {
    // The row-number column sits outside the dynamic layout
    let (title_w, source_w, kind_w, link_w) = result_table_columns(terminal_width.saturating_sub(6));

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(vec!["#", "Title", "Source", "Kind", "Link"]);

    for (i, result) in results.iter().enumerate() {
        let kind = Cell::new(truncate_with_ellipsis(result.kind.label(), kind_w));
        let kind = match result.kind {
            ResultKind::DirectArtifact => kind.fg(Color::Green),
            ResultKind::LandingPage => kind.fg(Color::DarkGrey),
        };

        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(format_title(&result.title, title_w)).add_attribute(Attribute::Bold),
            Cell::new(truncate_with_ellipsis(&result.source_name, source_w)),
            kind,
            Cell::new(truncate_with_ellipsis(&result.link, link_w)),
        ]);
    }

    table
}

/// One line per result: `N. title [source, kind]` then the link.
pub fn plain_results(results: &[SearchResult]) -> String {
    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} [{}, {}]\n   {}\n",
            i + 1,
            result.title,
            result.source_name,
            result.kind,
            result.link
        ));
    }
    out
}

/// Human-readable line for each backend that did not complete.
pub fn backend_warnings(report: &SearchReport) -> Vec<String> {
    report
        .backends
        .iter()
        .filter_map(|b| match &b.status {
            BackendStatus::Completed { .. } => None,
            BackendStatus::Disabled => None,
            BackendStatus::Skipped {
                missing_credentials,
            } => Some(format!(
                "{} skipped: missing {}",
                b.name,
                missing_credentials.join(", ")
            )),
            BackendStatus::Failed { error } => Some(format!("{} failed: {}", b.name, error.message)),
        })
        .collect()
}

/// Print backend warnings to stderr so stdout stays machine-readable.
pub fn print_backend_warnings(report: &SearchReport) {
    for warning in backend_warnings(report) {
        eprint_status(Status::Warning, &warning);
    }
}

/// Print the per-item lines and totals of a finished batch.
pub fn print_batch_report(report: &BatchReport) {
    print_section("Batch");
    for outcome in &report.outcomes {
        if outcome.is_success() {
            let name = outcome.file_name().unwrap_or(&outcome.request.link);
            print_status(
                Status::Success,
                &format!("{} ({})", name, format_file_size(outcome.bytes_written)),
            );
        } else {
            let reason = outcome
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            print_status(
                Status::Error,
                &format!("{}: {}", truncate_with_ellipsis(&outcome.request.link, 60), reason),
            );
        }
    }

    println!();
    println!(
        "{} succeeded, {} failed, {} written",
        report.successful().to_string().green().bold(),
        report.failed().to_string().red().bold(),
        format_file_size(report.total_bytes())
    );
    match &report.archive_path {
        Some(path) => print_status(Status::Info, &format!("Archive: {}", path.display())),
        None => print_status(Status::Warning, "No archive written: nothing was downloaded"),
    }
}

fn template(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner_style() -> ProgressStyle {
    template("{spinner:.cyan} {msg} {bytes} ({bytes_per_sec})").tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
}

fn bar_style() -> ProgressStyle {
    template("{msg}: {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})").progress_chars("█▓▒░ ")
}

/// Progress bar for one download.
///
/// Starts as a byte-counting spinner and switches to a sized bar once a
/// progress report carries the total.
pub struct DownloadBar {
    pb: ProgressBar,
    sized: AtomicBool,
}

impl DownloadBar {
    pub fn new(label: &str) -> Self {
        Self::from_bar(ProgressBar::new_spinner(), label)
    }

    /// A bar that never draws, for `--quiet` and non-terminal output.
    pub fn hidden() -> Self {
        Self::from_bar(ProgressBar::hidden(), "")
    }

    fn from_bar(pb: ProgressBar, label: &str) -> Self {
        pb.set_style(spinner_style());
        pb.set_message(label.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self {
            pb,
            sized: AtomicBool::new(false),
        }
    }

    pub fn update(&self, progress: Progress) {
        if let Some(total) = progress.total {
            if !self.sized.swap(true, Ordering::Relaxed) {
                self.pb.set_length(total);
                self.pb.set_style(bar_style());
            }
        }
        self.pb.set_position(progress.bytes_done);
    }

    pub fn finish_with_success(&self, msg: &str) {
        self.pb.finish_and_clear();
        if !self.pb.is_hidden() {
            print_status(Status::Success, msg);
        }
    }

    pub fn finish_with_error(&self, msg: &str) {
        self.pb.finish_and_clear();
        if !self.pb.is_hidden() {
            eprint_status(Status::Error, msg);
        }
    }

    pub fn position(&self) -> u64 {
        self.pb.position()
    }
}

/// Progress display for a whole batch: an item counter plus a bar for the
/// download in flight.
pub struct BatchBar {
    multi: MultiProgress,
    overall: ProgressBar,
    current: Mutex<Option<ProgressBar>>,
    hidden: bool,
}

impl BatchBar {
    pub fn new(items: usize) -> Self {
        Self::with_target(items, ProgressDrawTarget::stderr(), false)
    }

    pub fn hidden(items: usize) -> Self {
        Self::with_target(items, ProgressDrawTarget::hidden(), true)
    }

    fn with_target(items: usize, target: ProgressDrawTarget, hidden: bool) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(ProgressBar::new(items as u64));
        overall.set_style(
            template("{spinner:.green} {msg} {wide_bar:.green/blue} {pos}/{len}")
                .progress_chars("█   "),
        );
        overall.set_message(format!("{} Downloading", status_icon(Status::Download)));

        Self {
            multi,
            overall,
            current: Mutex::new(None),
            hidden,
        }
    }

    /// Feed one packager event into the display.
    pub fn handle(&self, progress: &BatchProgress) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        match &progress.event {
            BatchEvent::Started => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(spinner_style());
                pb.set_message(truncate_with_ellipsis(&progress.title, 40));
                *current = Some(pb);
            }
            BatchEvent::Transfer(p) => {
                if let Some(pb) = current.as_ref() {
                    if let (Some(total), None) = (p.total, pb.length()) {
                        pb.set_length(total);
                        pb.set_style(bar_style());
                    }
                    pb.set_position(p.bytes_done);
                }
            }
            BatchEvent::Completed { bytes } => {
                self.finish_item(current.take());
                self.println(status_line(
                    Status::Success,
                    &format!("{} ({})", progress.title, format_file_size(*bytes)),
                ));
            }
            BatchEvent::Failed { reason } => {
                self.finish_item(current.take());
                self.println(status_line(
                    Status::Error,
                    &format!("{}: {}", progress.title, reason),
                ));
            }
        }
    }

    fn finish_item(&self, pb: Option<ProgressBar>) {
        if let Some(pb) = pb {
            pb.finish_and_clear();
            self.multi.remove(&pb);
        }
        self.overall.inc(1);
    }

    fn println(&self, line: String) {
        if !self.hidden {
            let _ = self.multi.println(line);
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = self.current.lock().unwrap_or_else(|e| e.into_inner()).take() {
            pb.finish_and_clear();
        }
        self.overall.finish_and_clear();
    }

    pub fn completed(&self) -> u64 {
        self.overall.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BackendReport, DownloadOutcome};
    use crate::pipeline::DownloadError;
    use crate::sources::AdapterError;

    fn result(title: &str, kind: ResultKind) -> SearchResult {
        SearchResult::new(title, format!("https://example.com/{}.pdf", title), "arxiv", kind)
    }

    #[test]
    fn test_status_icon() {
        assert_eq!(status_icon(Status::Success), "✓");
        assert_eq!(status_icon(Status::Error), "✗");
        assert_eq!(status_icon(Status::Search), "🔍");
    }

    #[test]
    fn test_source_icon() {
        assert_eq!(source_icon("arxiv"), "📝");
        assert_eq!(source_icon("DuckDuckGo"), "🦆");
        assert_eq!(source_icon("unknown"), "📄");
    }

    #[test]
    fn test_results_table_rows() {
        let results = vec![
            result("alpha", ResultKind::DirectArtifact),
            result("beta", ResultKind::LandingPage),
        ];
        let table = results_table(&results, 120);
        assert_eq!(table.row_iter().count(), 2);

        let rendered = table.to_string();
        assert!(rendered.contains("alpha"));
        assert!(rendered.contains("page"));
    }

    #[test]
    fn test_results_table_truncates_long_titles() {
        let long = "word ".repeat(60);
        let results = vec![SearchResult::new(
            long.trim(),
            "https://example.com/x.pdf",
            "duckduckgo",
            ResultKind::DirectArtifact,
        )];
        let rendered = results_table(&results, 80).to_string();
        assert!(rendered.contains("..."));
        assert!(!rendered.contains(long.trim()));
    }

    #[test]
    fn test_plain_results_numbering() {
        let results = vec![
            result("a", ResultKind::DirectArtifact),
            result("b", ResultKind::DirectArtifact),
        ];
        let plain = plain_results(&results);
        assert!(plain.starts_with("1. a [arxiv, pdf]"));
        assert!(plain.contains("2. b [arxiv, pdf]"));
        assert!(plain.contains("https://example.com/b.pdf"));
    }

    #[test]
    fn test_backend_warnings() {
        let report = SearchReport {
            query: "q".to_string(),
            results: vec![],
            backends: vec![
                BackendReport {
                    name: "arxiv".to_string(),
                    status: BackendStatus::Completed { results: 2 },
                },
                BackendReport {
                    name: "serpapi".to_string(),
                    status: BackendStatus::Skipped {
                        missing_credentials: vec!["SERPAPI_API_KEY".to_string()],
                    },
                },
                BackendReport {
                    name: "duckduckgo".to_string(),
                    status: BackendStatus::Failed {
                        error: AdapterError::new("DuckDuckGo", "timed out after 20.0s"),
                    },
                },
                BackendReport {
                    name: "gutenberg".to_string(),
                    status: BackendStatus::Disabled,
                },
            ],
        };

        let warnings = backend_warnings(&report);
        assert_eq!(
            warnings,
            vec![
                "serpapi skipped: missing SERPAPI_API_KEY".to_string(),
                "duckduckgo failed: timed out after 20.0s".to_string(),
            ]
        );
    }

    #[test]
    fn test_download_bar_switches_to_sized() {
        let bar = DownloadBar::hidden();
        bar.update(Progress::new(100, None));
        assert_eq!(bar.position(), 100);
        bar.update(Progress::new(8192, Some(20000)));
        assert_eq!(bar.position(), 8192);
        assert!(bar.sized.load(Ordering::Relaxed));
    }

    #[test]
    fn test_batch_bar_counts_finished_items() {
        let bar = BatchBar::hidden(2);
        let event = |index, event| BatchProgress {
            index,
            total: 2,
            title: format!("item {}", index),
            event,
        };

        bar.handle(&event(0, BatchEvent::Started));
        bar.handle(&event(0, BatchEvent::Transfer(Progress::new(10, Some(10)))));
        bar.handle(&event(0, BatchEvent::Completed { bytes: 10 }));
        bar.handle(&event(1, BatchEvent::Started));
        bar.handle(&event(
            1,
            BatchEvent::Failed {
                reason: "HTTP 404".to_string(),
            },
        ));

        assert_eq!(bar.completed(), 2);
        bar.finish();
    }

    #[test]
    fn test_print_batch_report_does_not_panic() {
        let ok = DownloadOutcome::success(
            result("a", ResultKind::DirectArtifact),
            "/tmp/a.pdf".into(),
            2048,
            None,
        );
        let failed = DownloadOutcome::failed(
            result("b", ResultKind::DirectArtifact),
            DownloadError::HttpStatus { code: 404 },
            0,
        );
        let report = BatchReport {
            outcomes: vec![ok, failed],
            archive_path: None,
        };
        print_batch_report(&report);
    }
}
