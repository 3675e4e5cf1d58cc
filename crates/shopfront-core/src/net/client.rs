//! Network fetcher used by the offline worker.
//!
//! `Fetcher` is the seam between the worker and the network. `HttpFetcher`
//! is the real implementation over reqwest; tests plug in scripted fetchers.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{redirect, Client, Method, Url};
use tracing::debug;

use super::FetchError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// A request as seen by the worker's fetch handler.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl FetchRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Build a GET request for `target` resolved against `base`.
    /// `target` may be absolute or a path such as `/static/css/style.css`,
    /// but must stay on the origin of `base`.
    pub fn resolve(base: &Url, target: &str) -> Result<Self, FetchError> {
        let url = base
            .join(target)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", target, e)))?;
        if url.origin() != base.origin() {
            return Err(FetchError::InvalidUrl(format!(
                "{} is outside {}",
                target,
                base.origin().ascii_serialization()
            )));
        }
        Ok(Self::get(url))
    }

    /// Build a request for a path and query on `origin`. The path is taken
    /// literally, so `//host/x` stays a path on `origin`.
    pub fn on_origin(method: Method, origin: &Url, path: &str, query: Option<&str>) -> Self {
        let mut url = origin.clone();
        url.set_path(path);
        url.set_query(query);
        url.set_fragment(None);
        Self::new(method, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// The identity used as the cache key.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

/// A response produced either by the network or by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub from_cache: bool,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            from_cache: false,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Performs one network round trip per call. Non-2xx responses are returned
/// as `Ok`, only transport failures are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Fetcher over reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        // Redirects are handed back to the page untouched.
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?;

        debug!(url = %request.url, status, bytes = body.len(), "Network fetch complete");

        Ok(FetchResponse {
            status,
            headers,
            body,
            from_cache: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://localhost:5000").unwrap()
    }

    #[test]
    fn test_resolve_relative_asset() {
        let req = FetchRequest::resolve(&base(), "/static/css/style.css").unwrap();
        assert_eq!(req.cache_key(), "http://localhost:5000/static/css/style.css");
        assert!(req.is_get());
    }

    #[test]
    fn test_resolve_root_and_absolute_agree() {
        let a = FetchRequest::resolve(&base(), "/").unwrap();
        let b = FetchRequest::resolve(&base(), "http://localhost:5000/").unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_resolve_rejects_other_origins() {
        for target in ["//example.com/secret", "http://example.com/", "https://localhost:5000/"] {
            let err = FetchRequest::resolve(&base(), target).unwrap_err();
            assert!(matches!(err, FetchError::InvalidUrl(_)), "{} was accepted", target);
        }
    }

    #[test]
    fn test_on_origin_keeps_scheme_relative_path_local() {
        let req = FetchRequest::on_origin(Method::GET, &base(), "//example.com/secret", Some("a=1"));
        assert_eq!(req.url.host_str(), Some("localhost"));
        assert_eq!(req.url.port(), Some(5000));
        assert_eq!(req.url.path(), "//example.com/secret");
        assert_eq!(req.url.query(), Some("a=1"));
    }

    #[test]
    fn test_hop_by_hop_is_case_insensitive() {
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(is_hop_by_hop("host"));
        assert!(!is_hop_by_hop("content-type"));
    }

    #[test]
    fn test_response_header_lookup() {
        let resp = FetchResponse::new(200, "ok").with_header("Content-Type", "text/css");
        assert_eq!(resp.header("content-type"), Some("text/css"));
        assert!(resp.is_success());
        assert!(!FetchResponse::new(404, "").is_success());
    }
}
