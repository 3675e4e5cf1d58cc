//! Fake upstream site shared by the binary's tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use shopfront_core::net::Url;
use shopfront_core::{FetchError, FetchRequest, FetchResponse, Fetcher};

pub fn origin() -> Url {
    "http://localhost:5000".parse().unwrap()
}

/// Serves "/" and "/static/css/style.css" and 404s everything else.
/// Paths passed to `fail` refuse the connection. Every URL fetched is recorded.
#[derive(Default)]
pub struct FakeSite {
    failing: HashSet<String>,
    fetched: Mutex<Vec<String>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.fetched.lock().unwrap().push(request.url.to_string());

        let path = request.url.path();
        if self.failing.contains(path) {
            return Err(FetchError::Connection(format!("refused: {}", path)));
        }
        match path {
            "/" => Ok(FetchResponse::new(200, "home").with_header("content-type", "text/html")),
            "/static/css/style.css" => Ok(FetchResponse::new(200, "body {}")),
            _ => Ok(FetchResponse::new(404, "missing")),
        }
    }
}
