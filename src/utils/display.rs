//! Terminal display utilities for CLI output formatting.
//!
//! Titles from backends are free text of any length; everything here that
//! shortens text does so for display only.

use std::io::{self, IsTerminal};
use std::sync::OnceLock;
use terminal_size::terminal_size;
use unicode_width::UnicodeWidthChar;

/// Terminal information with cached size and capabilities.
#[derive(Debug, Clone)]
pub struct Terminal {
    width: usize,
    is_tty: bool,
}

static TERMINAL_INFO: OnceLock<Terminal> = OnceLock::new();

/// Default width when terminal size cannot be determined.
pub const DEFAULT_WIDTH: usize = 100;

/// Get the global terminal information, initialized on first call.
pub fn terminal_info() -> &'static Terminal {
    TERMINAL_INFO.get_or_init(|| {
        let width = terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(DEFAULT_WIDTH);

        Terminal {
            width,
            is_tty: io::stdout().is_terminal(),
        }
    })
}

/// Get the current terminal width in characters.
#[inline]
pub fn terminal_width() -> usize {
    terminal_info().width
}

/// Check if stdout is a terminal.
#[inline]
pub fn is_terminal() -> bool {
    terminal_info().is_tty
}

fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(1)
}

/// Display width of a string, counting wide characters as two columns.
pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Truncate text to fit within the specified width using unicode-aware truncation.
///
/// # Examples
///
/// ```
/// use pdf_harvest::utils::truncate_with_ellipsis;
///
/// assert_eq!(truncate_with_ellipsis("Hello World", 8), "Hello...");
/// assert_eq!(truncate_with_ellipsis("Hi", 8), "Hi");
/// ```
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }

    if display_width(text) <= max_width {
        return text.to_string();
    }

    let budget = max_width.saturating_sub(3);
    let mut used = 0;
    let mut truncated = String::new();

    for c in text.chars() {
        let w = char_width(c);
        if used + w > budget {
            break;
        }
        used += w;
        truncated.push(c);
    }

    format!("{}...", truncated)
}

/// Truncate text at word boundaries to fit within the specified width.
///
/// Falls back to [`truncate_with_ellipsis`] when the first word alone is too long.
pub fn truncate_at_word(text: &str, max_width: usize) -> String {
    if display_width(text) <= max_width {
        return text.to_string();
    }

    let budget = max_width.saturating_sub(3);
    let mut kept = String::new();

    for word in text.split_whitespace() {
        let candidate = if kept.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", kept, word)
        };
        if display_width(&candidate) > budget {
            break;
        }
        kept = candidate;
    }

    if kept.is_empty() {
        truncate_with_ellipsis(text, max_width)
    } else {
        format!("{}...", kept)
    }
}

/// Column width configuration for table display.
#[derive(Debug, Clone, Copy)]
pub struct ColumnConfig {
    pub min_width: usize,
    pub max_width: usize,
    pub weight: usize,
}

impl ColumnConfig {
    /// Create a new column config with minimum width.
    pub fn new(min_width: usize) -> Self {
        ColumnConfig {
            min_width,
            max_width: usize::MAX,
            weight: 1,
        }
    }

    /// Set the maximum width.
    pub fn max(mut self, max_width: usize) -> Self {
        self.max_width = max_width;
        self
    }

    /// Set the weight for space distribution.
    pub fn weight(mut self, weight: usize) -> Self {
        self.weight = weight;
        self
    }
}

/// Calculate column widths from a list of column configurations.
///
/// Every column gets its minimum; leftover space is shared by weight without
/// exceeding any column's maximum.
pub fn calculate_dynamic_column_widths(terminal_width: usize, configs: &[ColumnConfig]) -> Vec<usize> {
    let mut widths: Vec<usize> = configs.iter().map(|c| c.min_width).collect();
    if configs.is_empty() {
        return widths;
    }

    // Separators and cell padding
    let chrome = configs.len() * 3 + 1;
    let available = terminal_width.saturating_sub(chrome);
    let min_sum: usize = widths.iter().sum();
    let mut remaining = available.saturating_sub(min_sum);

    while remaining > 0 {
        let growable: Vec<usize> = (0..configs.len())
            .filter(|&i| configs[i].weight > 0 && widths[i] < configs[i].max_width)
            .collect();
        let total_weight: usize = growable.iter().map(|&i| configs[i].weight).sum();
        if total_weight == 0 {
            break;
        }

        let mut given = 0;
        for &i in &growable {
            let share = (remaining * configs[i].weight / total_weight).max(1);
            let room = configs[i].max_width - widths[i];
            let take = share.min(room).min(remaining - given);
            widths[i] += take;
            given += take;
            if given == remaining {
                break;
            }
        }

        if given == 0 {
            break;
        }
        remaining -= given;
    }

    widths
}

/// Column widths for the result listing: (title, source, kind, link).
pub fn result_table_columns(terminal_width: usize) -> (usize, usize, usize, usize) {
    let configs = [
        ColumnConfig::new(24).max(70).weight(3),
        ColumnConfig::new(8).max(16).weight(0),
        ColumnConfig::new(4).max(4).weight(0),
        ColumnConfig::new(24).max(90).weight(2),
    ];

    let widths = calculate_dynamic_column_widths(terminal_width, &configs);
    (widths[0], widths[1], widths[2], widths[3])
}

/// Format a result title for display, truncating at a word if necessary.
pub fn format_title(title: &str, max_width: usize) -> String {
    if max_width <= 3 {
        return "...".to_string();
    }
    truncate_at_word(title.trim(), max_width)
}

/// Get a human-readable file size.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
