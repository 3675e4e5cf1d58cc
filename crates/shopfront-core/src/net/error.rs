use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Unexpected response: {0}")]
    BadStatus(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Maximum length for response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Classify a non-success response. Used where a non-2xx status must fail
    /// the operation, as when pre-caching assets.
    pub fn from_status(status: u16, url: &str, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status {
            401 | 403 => FetchError::AccessDenied(format!("{} ({})", url, truncated)),
            404 => FetchError::NotFound(url.to_string()),
            500..=599 => FetchError::ServerError(format!("{} returned {}: {}", url, status, truncated)),
            _ => FetchError::BadStatus(format!("{} returned {}: {}", url, status, truncated)),
        }
    }

    /// True when the request never produced a response at all.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, FetchError::NetworkError(_) | FetchError::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classifies_common_codes() {
        assert!(matches!(FetchError::from_status(404, "/x", ""), FetchError::NotFound(u) if u == "/x"));
        assert!(matches!(FetchError::from_status(403, "/x", ""), FetchError::AccessDenied(_)));
        assert!(matches!(FetchError::from_status(503, "/x", "down"), FetchError::ServerError(_)));
        assert!(matches!(FetchError::from_status(302, "/x", ""), FetchError::BadStatus(_)));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = FetchError::truncate_body(&body);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }

    #[test]
    fn test_network_failure_detection() {
        assert!(FetchError::Connection("refused".into()).is_network_failure());
        assert!(!FetchError::NotFound("/".into()).is_network_failure());
    }
}
