//! Input validation for search queries and download URLs.

use thiserror::Error;

/// Validation error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Query contains control characters")]
    InvalidQuery,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL contains potentially dangerous characters")]
    DangerousUrl,
}

/// Trim a search query and reject empty or control-character input
pub fn validate_query(query: &str) -> Result<String, ValidationError> {
    let query = query.trim();

    if query.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }

    if query.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidQuery);
    }

    Ok(query.to_string())
}

/// Check that a URL is an absolute http(s) URL suitable for fetching
///
/// Returns the parsed URL on success.
pub fn validate_url(url: &str) -> Result<url::Url, ValidationError> {
    let url = url.trim();

    if url.is_empty() {
        return Err(ValidationError::InvalidUrl("empty URL".to_string()));
    }

    if url.contains('\n') || url.contains('\r') || url.contains('\0') {
        return Err(ValidationError::DangerousUrl);
    }

    let parsed = url::Url::parse(url).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::InvalidUrl(format!(
                "invalid scheme: {}",
                other
            )))
        }
    }

    if !parsed.has_host() {
        return Err(ValidationError::InvalidUrl("missing host".to_string()));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query() {
        assert_eq!(validate_query("  deep learning  ").unwrap(), "deep learning");
        assert_eq!(validate_query("   "), Err(ValidationError::EmptyQuery));
        assert_eq!(validate_query(""), Err(ValidationError::EmptyQuery));
        assert_eq!(validate_query("a\u{7}b"), Err(ValidationError::InvalidQuery));
    }

    #[test]
    fn test_validate_url_valid() {
        assert!(validate_url("https://arxiv.org/pdf/2301.12345.pdf").is_ok());
        assert!(validate_url("http://127.0.0.1:8080/file.pdf").is_ok());
        assert!(validate_url("  https://example.com  ").is_ok());
    }

    #[test]
    fn test_validate_url_invalid() {
        assert!(matches!(validate_url(""), Err(ValidationError::InvalidUrl(_))));
        assert!(matches!(validate_url("/relative/path.pdf"), Err(ValidationError::InvalidUrl(_))));
        assert!(matches!(validate_url("file:///etc/passwd"), Err(ValidationError::InvalidUrl(_))));
        assert!(matches!(validate_url("javascript:alert(1)"), Err(ValidationError::InvalidUrl(_))));
        assert_eq!(
            validate_url("https://example.com/\r\nX-Injected: 1"),
            Err(ValidationError::DangerousUrl)
        );
    }
}
