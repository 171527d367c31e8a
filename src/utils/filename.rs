//! Filename resolution for downloaded files and archive members.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Default cap on filename length, in characters, before the `.pdf` suffix
pub const DEFAULT_MAX_FILENAME_LEN: usize = 50;

/// Name used when nothing usable can be derived
pub const FALLBACK_FILENAME: &str = "download.pdf";

const ILLEGAL_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

fn extended_filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)filename\*\s*=\s*([^']*)'[^']*'([^;]+)"#).expect("valid regex")
    })
}

fn plain_filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*(?:"([^"]*)"|([^;]*))"#).expect("valid regex")
    })
}

/// Extract the filename from a `Content-Disposition` header value
///
/// Prefers the RFC 5987 `filename*=charset''value` form, then `filename=`.
/// Quotes are stripped; an empty name yields `None`.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    if let Some(caps) = extended_filename_re().captures(header) {
        let value = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        let decoded = urlencoding::decode(value)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| value.to_string());
        let decoded = decoded.trim_matches('"').trim().to_string();
        if !decoded.is_empty() {
            return Some(decoded);
        }
    }

    let caps = plain_filename_re().captures(header)?;
    let value = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().trim_matches('"').trim())?;

    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Last path segment of a URL, percent-decoded
pub fn filename_from_url(link: &str) -> Option<String> {
    let segment = match url::Url::parse(link) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(|s| s.to_string())?,
        Err(_) => {
            let end = link.find(['?', '#']).unwrap_or(link.len());
            link[..end].rsplit('/').find(|s| !s.is_empty())?.to_string()
        }
    };

    let decoded = urlencoding::decode(&segment)
        .map(|d| d.into_owned())
        .unwrap_or(segment);

    if decoded.trim().is_empty() {
        None
    } else {
        Some(decoded)
    }
}

/// Make a name safe for the filesystem and force a `.pdf` suffix
///
/// Strips `\ / * ? : " < > |` and control characters, trims whitespace, caps
/// the stem at `max_len` characters, and appends `.pdf` unless the name
/// already ends with it (case-insensitive). The suffix is added regardless of
/// the actual content type.
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim();

    let (stem, ext) = if has_pdf_suffix(cleaned) {
        cleaned.split_at(cleaned.len() - 4)
    } else {
        (cleaned, ".pdf")
    };

    let stem: String = stem.chars().take(max_len.max(1)).collect();
    let stem = stem.trim();

    if stem.is_empty() {
        return FALLBACK_FILENAME.to_string();
    }

    format!("{}{}", stem, ext)
}

/// Resolve the on-disk name for a download
///
/// Order: `Content-Disposition` filename, then the URL's last path segment.
pub fn resolve_filename(content_disposition: Option<&str>, link: &str, max_len: usize) -> String {
    let raw = content_disposition
        .and_then(filename_from_content_disposition)
        .or_else(|| filename_from_url(link))
        .unwrap_or_default();

    sanitize_filename(&raw, max_len)
}

/// Whether a name ends with `.pdf`, ignoring case
pub fn has_pdf_suffix(name: &str) -> bool {
    name.len() >= 4
        && name.is_char_boundary(name.len() - 4)
        && name[name.len() - 4..].eq_ignore_ascii_case(".pdf")
}

/// Pick a name not yet in `taken` by inserting ` (n)` before the extension
///
/// Returns `name` itself when it is free. The returned name is not added to
/// `taken`.
pub fn disambiguate(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };

    (1..)
        .map(|n| format!("{} ({}){}", stem, n, ext))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_quoted() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="report.pdf""#),
            Some("report.pdf".to_string())
        );
    }

    #[test]
    fn test_content_disposition_unquoted_with_trailing_params() {
        assert_eq!(
            filename_from_content_disposition("attachment; filename=notes.pdf; size=1234"),
            Some("notes.pdf".to_string())
        );
    }

    #[test]
    fn test_content_disposition_extended() {
        assert_eq!(
            filename_from_content_disposition(
                "attachment; filename=\"fallback.pdf\"; filename*=UTF-8''%E6%9B%B8%20one.pdf"
            ),
            Some("書 one.pdf".to_string())
        );
    }

    #[test]
    fn test_content_disposition_missing_or_empty() {
        assert_eq!(filename_from_content_disposition("inline"), None);
        assert_eq!(filename_from_content_disposition(r#"attachment; filename="""#), None);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.com/books/Atomic%20Habits.pdf"),
            Some("Atomic Habits.pdf".to_string())
        );
        assert_eq!(
            filename_from_url("https://example.com/files/paper.pdf?token=abc"),
            Some("paper.pdf".to_string())
        );
        assert_eq!(
            filename_from_url("https://example.com/dir/"),
            Some("dir".to_string())
        );
        assert_eq!(filename_from_url("https://example.com/"), None);
    }

    #[test]
    fn test_sanitize_strips_illegal_characters() {
        assert_eq!(
            sanitize_filename(r#"a\b/c*d?e:f"g<h>i|j.pdf"#, 50),
            "abcdefghij.pdf"
        );
    }

    #[test]
    fn test_sanitize_appends_suffix() {
        assert_eq!(sanitize_filename("thesis", 50), "thesis.pdf");
        assert_eq!(sanitize_filename("Thesis.PDF", 50), "Thesis.PDF");
        assert_eq!(sanitize_filename("index.html", 50), "index.html.pdf");
    }

    #[test]
    fn test_sanitize_truncates_stem() {
        let long = "x".repeat(80);
        let name = sanitize_filename(&format!("{}.pdf", long), 50);
        assert_eq!(name.len(), 54);
        assert!(name.ends_with(".pdf"));

        let wide = "書".repeat(60);
        let name = sanitize_filename(&wide, 50);
        assert_eq!(name.chars().count(), 54);
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_filename("", 50), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("???", 50), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename(".pdf", 50), FALLBACK_FILENAME);
    }

    #[test]
    fn test_resolve_order() {
        assert_eq!(
            resolve_filename(
                Some(r#"attachment; filename="report.pdf""#),
                "https://example.com/download?id=7",
                50
            ),
            "report.pdf"
        );
        assert_eq!(
            resolve_filename(None, "https://example.com/books/Atomic%20Habits.pdf", 50),
            "Atomic Habits.pdf"
        );
        assert_eq!(
            resolve_filename(Some("inline"), "https://example.com/get/42", 50),
            "42.pdf"
        );
    }

    #[test]
    fn test_disambiguate() {
        let mut taken = HashSet::new();
        assert_eq!(disambiguate("paper.pdf", &taken), "paper.pdf");

        taken.insert("paper.pdf".to_string());
        assert_eq!(disambiguate("paper.pdf", &taken), "paper (1).pdf");

        taken.insert("paper (1).pdf".to_string());
        assert_eq!(disambiguate("paper.pdf", &taken), "paper (2).pdf");

        taken.insert("README".to_string());
        assert_eq!(disambiguate("README", &taken), "README (1)");
    }
}
